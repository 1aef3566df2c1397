//! Sector-weighted candidate selection.
//!
//! Pure functions: the caller supplies the heatmap, the clock reading and the
//! random generator, and applies the resulting state update itself.

use std::time::{Duration, Instant};

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::IndexedRandom;

use super::heatmap::SectorHeatmap;
use super::sector::{Candidate, SECTOR_COUNT, Sector};

/// Scoring parameters for sector weights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightParams {
    /// Recency saturates at this age; never-visited sectors score at the cap
    pub recency_cap: Duration,
    /// Added to every score so recently visited sectors stay reachable
    pub base_score: f64,
    /// Multiplier for the sector opposite the last one
    pub opposite_penalty: f64,
    /// Multiplier for the two neighbours of the opposite sector
    pub neighbor_penalty: f64,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self {
            recency_cap: Duration::from_secs(300),
            base_score: 5.0,
            opposite_penalty: 0.1,
            neighbor_penalty: 0.3,
        }
    }
}

/// Selection weight of every sector.
///
/// `score = min(age, cap) + base`, then the anti-backtrack penalties are
/// applied relative to `last`.
pub fn sector_weights(
    heatmap: &SectorHeatmap,
    last: Option<Sector>,
    now: Instant,
    params: &WeightParams,
) -> [f64; SECTOR_COUNT] {
    let mut weights = [0.0; SECTOR_COUNT];

    for sector in Sector::ALL {
        let age = heatmap
            .age(sector, now)
            .map_or(params.recency_cap, |age| age.min(params.recency_cap));
        let mut score = age.as_secs_f64() + params.base_score;

        if let Some(last) = last {
            let opposite = last.opposite();
            if sector == opposite {
                score *= params.opposite_penalty;
            } else if opposite.neighbors().contains(&sector) {
                score *= params.neighbor_penalty;
            }
        }

        weights[sector.index()] = score;
    }

    weights
}

/// Weighted draw over the sectors that have candidates, then a uniform draw
/// within the chosen sector.
///
/// Falls back to a uniform draw over the populated sectors when the weights
/// are unusable (all zero, negative or non-finite).
pub fn choose_candidate<R: Rng + ?Sized>(
    candidates: &[Candidate],
    weights: &[f64; SECTOR_COUNT],
    rng: &mut R,
) -> Option<Candidate> {
    let mut groups: [Vec<Candidate>; SECTOR_COUNT] = Default::default();
    for candidate in candidates {
        groups[candidate.sector.index()].push(*candidate);
    }

    let populated: Vec<usize> = (0..SECTOR_COUNT)
        .filter(|&i| !groups[i].is_empty())
        .collect();

    let sector = match WeightedIndex::new(populated.iter().map(|&i| weights[i])) {
        Ok(dist) => populated[dist.sample(rng)],
        Err(e) => {
            tracing::debug!("Sector weights unusable ({}), drawing uniformly", e);
            *populated.choose(rng)?
        }
    };

    groups[sector].choose(rng).copied()
}

/// Format weights of populated sectors for logging.
pub(crate) fn describe_weights(
    candidates: &[Candidate],
    weights: &[f64; SECTOR_COUNT],
    last: Option<Sector>,
) -> String {
    let opposite = last.map(Sector::opposite);
    Sector::ALL
        .into_iter()
        .filter(|s| candidates.iter().any(|c| c.sector == *s))
        .map(|s| {
            let mark = if Some(s) == opposite { " (opposite)" } else { "" };
            format!("{}: {:.1}{}", s, weights[s.index()], mark)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
