//! Configuration loading for DrishtiNav

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::motion::MotionConfig;
use crate::movement::MovementConfig;
use crate::pathfinding::PathfindingConfig;
use crate::raster::ColorSignature;
use crate::terrain::TerrainConfig;

/// Main configuration structure
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavConfig {
    #[serde(default)]
    pub minimap: TerrainConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub pathfinding: PathfindingConfig,
    #[serde(default)]
    pub movement: MovementConfig,
}

impl NavConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: NavConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML text.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| NavError::Config(e.to_string()))
    }

    /// Reject parameter combinations the navigation core cannot work with.
    pub fn validate(&self) -> Result<()> {
        let m = &self.minimap;
        if m.region.width == 0 || m.region.height == 0 {
            return Err(NavError::Config("minimap region is empty".into()));
        }
        if !m.region.contains(m.player_center) {
            return Err(NavError::Config(format!(
                "player center ({}, {}) lies outside the {}x{} minimap",
                m.player_center.x, m.player_center.y, m.region.width, m.region.height
            )));
        }
        if m.safety_margin >= m.check_distance {
            return Err(NavError::Config(format!(
                "safety margin {} must be below check distance {}",
                m.safety_margin, m.check_distance
            )));
        }
        if m.safety_radius < 0 || m.strip_half_width < 0 {
            return Err(NavError::Config(
                "safety radius and strip half width must not be negative".into(),
            ));
        }
        for (name, signature) in [
            ("walkable", &m.colors.walkable),
            ("obstacle", &m.colors.obstacle),
            ("hazard", &m.colors.hazard),
        ] {
            if let Some(signature) = signature
                && signature.is_empty()
            {
                let detail = match signature {
                    ColorSignature::Reference { .. } => "has no reference colors",
                    ColorSignature::HsvRange { .. } => "has an inverted HSV range",
                };
                return Err(NavError::Config(format!("{name} color rule {detail}")));
            }
        }

        let motion = &self.motion;
        if motion.inner_radius < 0.0 || motion.inner_radius > motion.outer_radius {
            return Err(NavError::Config(format!(
                "motion annulus inner radius {} must be within [0, {}]",
                motion.inner_radius, motion.outer_radius
            )));
        }
        if motion.poll_interval_ms == 0 {
            return Err(NavError::Config("motion poll interval must be positive".into()));
        }
        if motion.required_still_reads == 0 {
            return Err(NavError::Config(
                "at least one still read is required to confirm a stop".into(),
            ));
        }

        let p = &self.pathfinding;
        if p.edge_distance < 0.0 {
            return Err(NavError::Config("edge distance must not be negative".into()));
        }
        if p.max_stuck_time_ms == 0 {
            return Err(NavError::Config("stuck time must be positive".into()));
        }
        if !p.recency_cap_secs.is_finite() || p.recency_cap_secs < 0.0 {
            return Err(NavError::Config("recency cap must be finite and non-negative".into()));
        }
        // A zero factor would exclude a sector from the draw entirely
        let factors = [p.base_score, p.opposite_penalty, p.neighbor_penalty];
        if factors.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(NavError::Config(
                "base score and sector penalties must be finite and positive".into(),
            ));
        }

        let mv = &self.movement;
        if mv.pause_after_arrival_min_ms > mv.pause_after_arrival_max_ms {
            return Err(NavError::Config(format!(
                "arrival pause min {}ms exceeds max {}ms",
                mv.pause_after_arrival_min_ms, mv.pause_after_arrival_max_ms
            )));
        }

        Ok(())
    }
}
