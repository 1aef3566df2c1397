//! Simple stateless destination strategies.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::raster::PixelPoint;

use super::sector::Candidate;

/// Screen quadrant around the agent (north is up, -y).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    #[serde(rename = "NE")]
    NorthEast,
    #[serde(rename = "NW")]
    NorthWest,
    #[serde(rename = "SE")]
    SouthEast,
    #[serde(rename = "SW")]
    SouthWest,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthEast,
        Quadrant::NorthWest,
        Quadrant::SouthEast,
        Quadrant::SouthWest,
    ];

    /// Quadrant of an offset from the agent. Offsets on the vertical axis
    /// count as east, offsets on the horizontal axis as south.
    pub fn of(offset: PixelPoint) -> Self {
        match (offset.x >= 0, offset.y < 0) {
            (true, true) => Quadrant::NorthEast,
            (false, true) => Quadrant::NorthWest,
            (true, false) => Quadrant::SouthEast,
            (false, false) => Quadrant::SouthWest,
        }
    }
}

/// Destination strategy without history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateSelector {
    /// Uniform draw
    Random,
    /// Farthest from the agent
    Farthest,
    /// Uniform draw in a quadrant; a random non-empty quadrant when the
    /// preferred one is empty or not given
    ByQuadrant(Option<Quadrant>),
}

impl CandidateSelector {
    pub fn select<R: Rng + ?Sized>(
        &self,
        candidates: &[Candidate],
        rng: &mut R,
    ) -> Option<Candidate> {
        match self {
            CandidateSelector::Random => candidates.choose(rng).copied(),
            CandidateSelector::Farthest => candidates
                .iter()
                .max_by(|a, b| a.distance.total_cmp(&b.distance))
                .copied(),
            CandidateSelector::ByQuadrant(preferred) => {
                let in_quadrant = |q: Quadrant| -> Vec<Candidate> {
                    candidates
                        .iter()
                        .filter(|c| Quadrant::of(c.offset) == q)
                        .copied()
                        .collect()
                };

                if let Some(q) = preferred {
                    let group = in_quadrant(*q);
                    if let Some(c) = group.choose(rng) {
                        return Some(*c);
                    }
                }

                let groups: Vec<Vec<Candidate>> = Quadrant::ALL
                    .into_iter()
                    .map(in_quadrant)
                    .filter(|g| !g.is_empty())
                    .collect();
                groups.choose(rng)?.choose(rng).copied()
            }
        }
    }
}
