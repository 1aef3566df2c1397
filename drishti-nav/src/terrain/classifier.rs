//! Pixel-level terrain classification on minimap snapshots.
//!
//! Answers two questions for the planner:
//! - is a cardinal direction next to the agent safe to walk into?
//! - which walkable pixels are safe destinations?
//!
//! Both answers fail closed: a missing snapshot or an unrecognized color is
//! never treated as walkable.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

use crate::device::RasterSource;
use crate::pathfinding::Candidate;
use crate::raster::{LocalMap, Mask, PixelPoint, PixelRect};

use super::config::{MinimapGeometry, TerrainConfig};

/// Terrain classes recognized on the minimap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TerrainClass {
    Walkable,
    Obstacle,
    Hazard,
}

/// Result of classifying a point with its neighbourhood.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointClass {
    Hazard,
    Obstacle,
    Walkable,
    /// No known color nearby; treated as unsafe
    Unclassified,
}

impl PointClass {
    pub fn is_safe(self) -> bool {
        self == PointClass::Walkable
    }
}

/// Cardinal directions in screen orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];
}

/// Per-class masks of one snapshot.
#[derive(Clone, Debug)]
pub struct TerrainMasks {
    pub walkable: Mask,
    pub obstacle: Mask,
    pub hazard: Mask,
}

impl TerrainMasks {
    pub fn get(&self, class: TerrainClass) -> &Mask {
        match class {
            TerrainClass::Walkable => &self.walkable,
            TerrainClass::Obstacle => &self.obstacle,
            TerrainClass::Hazard => &self.hazard,
        }
    }
}

/// Cumulative candidate filtering statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClassifierStats {
    /// Snapshots analysed for candidates
    pub snapshots: u64,
    /// Snapshots that could not be captured
    pub observation_failures: u64,
    /// Walkable pixels examined as potential candidates
    pub considered: u64,
    /// Candidates that passed every filter (before the cap)
    pub accepted: u64,
    pub rejected_too_close: u64,
    pub rejected_obstacle: u64,
    pub rejected_hazard: u64,
    /// Times erosion emptied the mask and the raw mask was used instead
    pub erosion_fallbacks: u64,
}

/// Terrain classifier.
#[derive(Clone, Debug)]
pub struct TerrainClassifier {
    config: TerrainConfig,
    stats: ClassifierStats,
}

impl TerrainClassifier {
    pub fn new(config: TerrainConfig) -> Self {
        tracing::info!(
            "Terrain classifier: region ({}, {}) {}x{}, center ({}, {})",
            config.region.x,
            config.region.y,
            config.region.width,
            config.region.height,
            config.player_center.x,
            config.player_center.y
        );
        Self {
            config,
            stats: ClassifierStats::default(),
        }
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn geometry(&self) -> MinimapGeometry {
        self.config.geometry()
    }

    pub fn stats(&self) -> &ClassifierStats {
        &self.stats
    }

    /// Pixel membership test for one class.
    pub fn classify(&self, map: &LocalMap, point: PixelPoint, class: TerrainClass) -> bool {
        let Some(signature) = self.config.colors.signature(class) else {
            return false;
        };
        map.pixel(point)
            .is_some_and(|pixel| signature.matches(pixel, self.config.color_tolerance))
    }

    /// Build all three class masks in one pass.
    pub fn masks(&self, map: &LocalMap) -> TerrainMasks {
        let build = |class: TerrainClass| match self.config.colors.signature(class) {
            Some(signature) => Mask::from_fn(map.width(), map.height(), |x, y| {
                let pixel = map.image().get_pixel(x, y).0;
                signature.matches(pixel, self.config.color_tolerance)
            }),
            None => Mask::empty(map.width(), map.height()),
        };

        TerrainMasks {
            walkable: build(TerrainClass::Walkable),
            obstacle: build(TerrainClass::Obstacle),
            hazard: build(TerrainClass::Hazard),
        }
    }

    /// Priority-ordered classification of a point's `safety_radius`
    /// neighbourhood: hazard beats obstacle beats walkable.
    pub fn classify_point(&self, masks: &TerrainMasks, point: PixelPoint) -> PointClass {
        let window = PixelRect::around(point, self.config.safety_radius);
        if masks.hazard.any_in(window) {
            PointClass::Hazard
        } else if masks.obstacle.any_in(window) {
            PointClass::Obstacle
        } else if masks.walkable.any_in(window) {
            PointClass::Walkable
        } else {
            PointClass::Unclassified
        }
    }

    /// Strip examined for a direction, relative to the snapshot.
    fn direction_strip(&self, center: PixelPoint, direction: Direction) -> PixelRect {
        let reach = self.config.check_distance;
        let margin = self.config.safety_margin;
        let half = self.config.strip_half_width;

        match direction {
            Direction::Up => PixelRect::new(
                center.x - half,
                center.y - reach,
                center.x + half + 1,
                center.y - margin,
            ),
            Direction::Down => PixelRect::new(
                center.x - half,
                center.y + margin + 1,
                center.x + half + 1,
                center.y + reach + 1,
            ),
            Direction::Left => PixelRect::new(
                center.x - reach,
                center.y - half,
                center.x - margin,
                center.y + half + 1,
            ),
            Direction::Right => PixelRect::new(
                center.x + margin + 1,
                center.y - half,
                center.x + reach + 1,
                center.y + half + 1,
            ),
        }
    }

    fn direction_safe_with(
        &self,
        masks: &TerrainMasks,
        center: PixelPoint,
        direction: Direction,
    ) -> bool {
        let strip = self.direction_strip(center, direction);

        if masks.hazard.any_in(strip) {
            tracing::debug!("{:?}: hazard detected", direction);
            return false;
        }
        if masks.obstacle.any_in(strip) {
            tracing::debug!("{:?}: obstacle detected", direction);
            return false;
        }
        if masks.walkable.any_in(strip) {
            tracing::debug!("{:?}: walkable", direction);
            return true;
        }

        tracing::debug!("{:?}: unrecognized colors, assuming unsafe", direction);
        false
    }

    /// Direction check on an existing snapshot.
    pub fn direction_safe_in(&self, map: &LocalMap, direction: Direction) -> bool {
        let masks = self.masks(map);
        self.direction_safe_with(&masks, map.center(), direction)
    }

    /// Capture a frame and check one cardinal direction.
    pub fn is_direction_safe(&self, source: &mut dyn RasterSource, direction: Direction) -> bool {
        match self.geometry().capture(source) {
            Some(map) => self.direction_safe_in(&map, direction),
            None => false,
        }
    }

    /// Capture a frame and list every safe cardinal direction.
    ///
    /// Empty when the frame cannot be captured or nothing is safe.
    pub fn safe_directions(&self, source: &mut dyn RasterSource) -> Vec<Direction> {
        let Some(map) = self.geometry().capture(source) else {
            tracing::warn!("Cannot observe minimap, no direction is considered safe");
            return Vec::new();
        };
        self.safe_directions_in(&map)
    }

    /// Every safe cardinal direction on an existing snapshot.
    pub fn safe_directions_in(&self, map: &LocalMap) -> Vec<Direction> {
        let masks = self.masks(map);
        let safe: Vec<Direction> = Direction::ALL
            .into_iter()
            .filter(|&d| self.direction_safe_with(&masks, map.center(), d))
            .collect();

        if safe.is_empty() {
            tracing::warn!("No safe direction detected");
        } else {
            tracing::info!("Safe directions: {:?}", safe);
        }
        safe
    }

    /// Capture a frame and return safe destination candidates.
    pub fn walkable_candidates<R: Rng + ?Sized>(
        &mut self,
        source: &mut dyn RasterSource,
        min_distance: f32,
        rng: &mut R,
    ) -> Vec<Candidate> {
        match self.geometry().capture(source) {
            Some(map) => self.candidates_in(&map, min_distance, rng),
            None => {
                self.stats.observation_failures += 1;
                tracing::warn!("Cannot observe minimap, no candidates available");
                Vec::new()
            }
        }
    }

    /// Safe destination candidates on an existing snapshot.
    ///
    /// Walkable pixels are eroded once so destinations sit away from terrain
    /// borders; if erosion removes everything the raw mask is used. Each
    /// surviving pixel must be at least `min_distance` from the agent and have
    /// no hazard or obstacle within `safety_radius`.
    pub fn candidates_in<R: Rng + ?Sized>(
        &mut self,
        map: &LocalMap,
        min_distance: f32,
        rng: &mut R,
    ) -> Vec<Candidate> {
        self.stats.snapshots += 1;
        let masks = self.masks(map);
        let center = map.center();

        let eroded = masks.walkable.eroded();
        let interior = if eroded.is_empty() {
            if !masks.walkable.is_empty() {
                self.stats.erosion_fallbacks += 1;
                tracing::warn!("Erosion removed every walkable pixel, using the raw mask");
            }
            &masks.walkable
        } else {
            &eroded
        };

        let mut accepted = Vec::new();
        let mut considered = 0u64;
        let mut too_close = 0u64;
        let mut obstacle = 0u64;
        let mut hazard = 0u64;

        for point in interior.points() {
            considered += 1;

            if point.distance(&center) < min_distance {
                too_close += 1;
                continue;
            }

            let window = PixelRect::around(point, self.config.safety_radius);
            if masks.hazard.any_in(window) {
                hazard += 1;
                continue;
            }
            if masks.obstacle.any_in(window) {
                obstacle += 1;
                continue;
            }

            accepted.push(Candidate::new(point, center));
        }

        self.stats.considered += considered;
        self.stats.accepted += accepted.len() as u64;
        self.stats.rejected_too_close += too_close;
        self.stats.rejected_obstacle += obstacle;
        self.stats.rejected_hazard += hazard;

        tracing::info!(
            "{} candidate pixels: {} accepted, {} too close, {} near hazard, {} near obstacle",
            considered,
            accepted.len(),
            too_close,
            hazard,
            obstacle
        );

        if accepted.is_empty() {
            tracing::warn!(
                "No safe candidate found, all {} pixels rejected",
                considered
            );
            return accepted;
        }

        let cap = self.config.candidate_cap;
        if cap > 0 && accepted.len() > cap {
            accepted = accepted.choose_multiple(rng, cap).copied().collect();
        }

        accepted
    }
}
