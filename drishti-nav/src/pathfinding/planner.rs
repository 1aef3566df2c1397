//! Destination planner with a per-sector visit heatmap.
//!
//! Destinations are drawn from the classifier's safe candidates. Sectors that
//! have not been visited for a while are favoured, and the direction we just
//! came from is penalised so the agent does not oscillate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::device::RasterSource;
use crate::terrain::TerrainClassifier;

use super::heatmap::SectorHeatmap;
use super::sector::{Candidate, Sector};
use super::selection::{WeightParams, choose_candidate, describe_weights, sector_weights};

/// Planner settings (`[pathfinding]` section).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathfindingConfig {
    /// Minimum distance of a destination from the agent (pixels)
    #[serde(default = "default_edge_distance")]
    pub edge_distance: f32,

    /// Time after which a walk is considered stuck (milliseconds)
    #[serde(default = "default_max_stuck_time_ms")]
    pub max_stuck_time_ms: u64,

    /// Age at which sector recency saturates (seconds)
    #[serde(default = "default_recency_cap_secs")]
    pub recency_cap_secs: f64,

    /// Score added to every sector
    #[serde(default = "default_base_score")]
    pub base_score: f64,

    /// Weight multiplier for the sector opposite the last one
    #[serde(default = "default_opposite_penalty")]
    pub opposite_penalty: f64,

    /// Weight multiplier for the neighbours of the opposite sector
    #[serde(default = "default_neighbor_penalty")]
    pub neighbor_penalty: f64,

    /// Fixed random seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl PathfindingConfig {
    pub fn stuck_threshold(&self) -> Duration {
        Duration::from_millis(self.max_stuck_time_ms)
    }

    pub fn weight_params(&self) -> WeightParams {
        WeightParams {
            recency_cap: Duration::from_secs_f64(self.recency_cap_secs.max(0.0)),
            base_score: self.base_score,
            opposite_penalty: self.opposite_penalty,
            neighbor_penalty: self.neighbor_penalty,
        }
    }
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            edge_distance: default_edge_distance(),
            max_stuck_time_ms: default_max_stuck_time_ms(),
            recency_cap_secs: default_recency_cap_secs(),
            base_score: default_base_score(),
            opposite_penalty: default_opposite_penalty(),
            neighbor_penalty: default_neighbor_penalty(),
            seed: None,
        }
    }
}

fn default_edge_distance() -> f32 {
    30.0
}
fn default_max_stuck_time_ms() -> u64 {
    3000
}
fn default_recency_cap_secs() -> f64 {
    300.0
}
fn default_base_score() -> f64 {
    5.0
}
fn default_opposite_penalty() -> f64 {
    0.1
}
fn default_neighbor_penalty() -> f64 {
    0.3
}

/// Snapshot of planner statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PathfindingStats {
    /// Destinations chosen by sector weighting
    pub total_paths: u64,
    /// Stuck detections
    pub stuck_count: u64,
    /// Sectors visited since the last reset
    pub visited_sectors: usize,
    pub last_candidate: Option<Candidate>,
    pub last_sector: Option<Sector>,
}

/// Sector-fair destination planner.
pub struct PathfindingSystem {
    config: PathfindingConfig,
    classifier: TerrainClassifier,
    clock: Arc<dyn Clock>,
    rng: StdRng,

    heatmap: SectorHeatmap,
    last_sector: Option<Sector>,
    last_candidate: Option<Candidate>,

    total_paths: u64,
    stuck_count: u64,
}

impl PathfindingSystem {
    pub fn new(
        config: PathfindingConfig,
        classifier: TerrainClassifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        tracing::info!(
            "Pathfinding: edge distance {}px, stuck after {}ms, seed {:?}",
            config.edge_distance,
            config.max_stuck_time_ms,
            config.seed
        );

        Self {
            config,
            classifier,
            clock,
            rng,
            heatmap: SectorHeatmap::new(),
            last_sector: None,
            last_candidate: None,
            total_paths: 0,
            stuck_count: 0,
        }
    }

    pub fn config(&self) -> &PathfindingConfig {
        &self.config
    }

    pub fn classifier(&self) -> &TerrainClassifier {
        &self.classifier
    }

    pub fn heatmap(&self) -> &SectorHeatmap {
        &self.heatmap
    }

    pub fn last_candidate(&self) -> Option<Candidate> {
        self.last_candidate
    }

    pub fn last_sector(&self) -> Option<Sector> {
        self.last_sector
    }

    /// Pick the next destination by sector weighting.
    pub fn next_candidate(&mut self, source: &mut dyn RasterSource) -> Option<Candidate> {
        let candidates =
            self.classifier
                .walkable_candidates(source, self.config.edge_distance, &mut self.rng);
        if candidates.is_empty() {
            tracing::warn!("No walkable destination detected");
            return None;
        }

        let now = self.clock.now();
        let weights = sector_weights(
            &self.heatmap,
            self.last_sector,
            now,
            &self.config.weight_params(),
        );
        let chosen = choose_candidate(&candidates, &weights, &mut self.rng)?;

        tracing::info!(
            "Sector {} selected (weights: {})",
            chosen.sector,
            describe_weights(&candidates, &weights, self.last_sector)
        );

        self.record(chosen, now);
        self.total_paths += 1;
        Some(chosen)
    }

    /// Pick the destination pointing most directly away from the last one.
    ///
    /// Without a previous destination this is [`Self::next_candidate`].
    pub fn opposite_candidate(&mut self, source: &mut dyn RasterSource) -> Option<Candidate> {
        let Some(last) = self.last_candidate else {
            return self.next_candidate(source);
        };

        let candidates =
            self.classifier
                .walkable_candidates(source, self.config.edge_distance, &mut self.rng);

        // First minimum wins on ties
        let chosen = candidates
            .into_iter()
            .fold(None::<Candidate>, |best, c| match best {
                Some(b) if b.offset.dot(&last.offset) <= c.offset.dot(&last.offset) => Some(b),
                _ => Some(c),
            })?;

        tracing::info!(
            "Opposite direction selected: ({}, {}) in {}",
            chosen.point.x,
            chosen.point.y,
            chosen.sector
        );

        self.record(chosen, self.clock.now());
        Some(chosen)
    }

    /// Whether a walk started at `step_start` has run too long.
    ///
    /// Every positive answer is counted.
    pub fn is_stuck(&mut self, step_start: Instant) -> bool {
        let elapsed = self.clock.since(step_start);
        let stuck = elapsed >= self.config.stuck_threshold();

        if stuck {
            self.stuck_count += 1;
            tracing::warn!(
                "Agent appears stuck ({:.1}s >= {:.1}s)",
                elapsed.as_secs_f32(),
                self.config.stuck_threshold().as_secs_f32()
            );
        }
        stuck
    }

    /// Forget visit history and the last destination.
    pub fn reset_history(&mut self) {
        self.heatmap.clear();
        self.last_sector = None;
        self.last_candidate = None;
        tracing::debug!("Sector history reset");
    }

    pub fn stats(&self) -> PathfindingStats {
        PathfindingStats {
            total_paths: self.total_paths,
            stuck_count: self.stuck_count,
            visited_sectors: self.heatmap.visited_count(),
            last_candidate: self.last_candidate,
            last_sector: self.last_sector,
        }
    }

    fn record(&mut self, candidate: Candidate, now: Instant) {
        self.heatmap.visit(candidate.sector, now);
        self.last_sector = Some(candidate.sector);
        self.last_candidate = Some(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::raster::{LocalMap, PixelPoint, Region};
    use crate::terrain::TerrainConfig;

    const FLOOR: [u8; 3] = [255, 102, 0];
    const VOID: [u8; 3] = [90, 140, 200];

    /// Source that always returns the same frame.
    struct Still(LocalMap);

    impl RasterSource for Still {
        fn capture_region(&mut self, _region: Region) -> Option<image::RgbImage> {
            Some(self.0.image().clone())
        }
    }

    struct Blind;

    impl RasterSource for Blind {
        fn capture_region(&mut self, _region: Region) -> Option<image::RgbImage> {
            None
        }
    }

    fn planner(clock: Arc<ManualClock>) -> PathfindingSystem {
        let terrain = TerrainConfig {
            region: Region::new(0, 0, 81, 81),
            player_center: PixelPoint::new(40, 40),
            ..TerrainConfig::default()
        };
        let config = PathfindingConfig {
            seed: Some(9),
            ..PathfindingConfig::default()
        };
        PathfindingSystem::new(config, TerrainClassifier::new(terrain), clock)
    }

    /// Floor patches east and west of the agent, everything else unknown.
    fn two_patches() -> LocalMap {
        let mut map = LocalMap::filled(81, 81, PixelPoint::new(40, 40), VOID).unwrap();
        for y in 36..45 {
            for x in 72..80 {
                map.set_pixel(PixelPoint::new(x, y), FLOOR);
            }
            for x in 1..9 {
                map.set_pixel(PixelPoint::new(x, y), FLOOR);
            }
        }
        map
    }

    #[test]
    fn test_next_candidate_updates_state() {
        let clock = Arc::new(ManualClock::new());
        let mut planner = planner(clock.clone());
        let mut source = Still(two_patches());

        let chosen = planner.next_candidate(&mut source).unwrap();

        assert!(chosen.distance >= 30.0);
        assert_eq!(planner.last_candidate(), Some(chosen));
        assert_eq!(planner.last_sector(), Some(chosen.sector));
        assert_eq!(planner.heatmap().last_visit(chosen.sector), Some(clock.now()));
        assert_eq!(planner.stats().total_paths, 1);
    }

    #[test]
    fn test_opposite_candidate_points_away() {
        let clock = Arc::new(ManualClock::new());
        let mut planner = planner(clock);
        let mut source = Still(two_patches());

        let first = planner.next_candidate(&mut source).unwrap();
        let opposite = planner.opposite_candidate(&mut source).unwrap();

        assert!(first.offset.dot(&opposite.offset) < 0);
        assert_eq!(planner.last_candidate(), Some(opposite));
        assert_eq!(planner.stats().total_paths, 1);
        assert_eq!(planner.stats().visited_sectors, 2);
    }

    #[test]
    fn test_opposite_without_history_falls_back() {
        let clock = Arc::new(ManualClock::new());
        let mut planner = planner(clock);
        let mut source = Still(two_patches());

        assert!(planner.opposite_candidate(&mut source).is_some());
        assert_eq!(planner.stats().total_paths, 1);
    }

    #[test]
    fn test_no_observation_gives_no_candidate() {
        let clock = Arc::new(ManualClock::new());
        let mut planner = planner(clock);

        assert!(planner.next_candidate(&mut Blind).is_none());
        assert!(planner.opposite_candidate(&mut Blind).is_none());
        assert_eq!(planner.stats().total_paths, 0);
    }

    #[test]
    fn test_is_stuck_counts() {
        let clock = Arc::new(ManualClock::new());
        let mut planner = planner(clock.clone());
        let start = clock.now();

        clock.advance(Duration::from_millis(2999));
        assert!(!planner.is_stuck(start));
        clock.advance(Duration::from_millis(1));
        assert!(planner.is_stuck(start));
        assert!(planner.is_stuck(start));
        assert_eq!(planner.stats().stuck_count, 2);
    }

    #[test]
    fn test_reset_history() {
        let clock = Arc::new(ManualClock::new());
        let mut planner = planner(clock);
        let mut source = Still(two_patches());
        planner.next_candidate(&mut source).unwrap();

        planner.reset_history();

        let stats = planner.stats();
        assert_eq!(stats.visited_sectors, 0);
        assert_eq!(stats.last_candidate, None);
        assert_eq!(stats.last_sector, None);
        assert_eq!(stats.total_paths, 1);
    }
}
