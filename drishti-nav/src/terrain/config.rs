//! Minimap geometry and terrain color configuration.

use serde::{Deserialize, Serialize};

use crate::device::RasterSource;
use crate::raster::{ColorSignature, LocalMap, PixelPoint, Region};

use super::TerrainClass;

/// Where the minimap is on screen and where the agent sits inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MinimapGeometry {
    /// Capture rectangle in screen coordinates
    pub region: Region,
    /// Agent pixel, relative to the region
    pub center: PixelPoint,
}

impl MinimapGeometry {
    pub fn new(region: Region, center: PixelPoint) -> Self {
        Self { region, center }
    }

    /// Capture one frame, failing closed on any problem.
    ///
    /// A frame whose size differs from the configured region is rejected:
    /// the agent pixel would not be where we expect it.
    pub fn capture(&self, source: &mut dyn RasterSource) -> Option<LocalMap> {
        let Some(image) = source.capture_region(self.region) else {
            tracing::warn!("Minimap capture failed");
            return None;
        };

        if image.width() != self.region.width || image.height() != self.region.height {
            tracing::warn!(
                "Minimap capture has unexpected size {}x{} (expected {}x{})",
                image.width(),
                image.height(),
                self.region.width,
                self.region.height
            );
            return None;
        }

        LocalMap::new(image, self.center)
    }
}

/// Color rules per terrain class. A class without a rule never matches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainPalette {
    #[serde(default = "default_walkable")]
    pub walkable: Option<ColorSignature>,

    #[serde(default = "default_obstacle")]
    pub obstacle: Option<ColorSignature>,

    #[serde(default = "default_hazard")]
    pub hazard: Option<ColorSignature>,
}

impl TerrainPalette {
    pub fn signature(&self, class: TerrainClass) -> Option<&ColorSignature> {
        match class {
            TerrainClass::Walkable => self.walkable.as_ref(),
            TerrainClass::Obstacle => self.obstacle.as_ref(),
            TerrainClass::Hazard => self.hazard.as_ref(),
        }
    }

    /// First reference color of a class, used when painting overlays and
    /// synthetic terrain.
    pub fn representative(&self, class: TerrainClass) -> Option<[u8; 3]> {
        match self.signature(class)? {
            ColorSignature::Reference { rgb_colors } => rgb_colors.first().copied(),
            ColorSignature::HsvRange { .. } => None,
        }
    }
}

impl Default for TerrainPalette {
    fn default() -> Self {
        Self {
            walkable: default_walkable(),
            obstacle: default_obstacle(),
            hazard: default_hazard(),
        }
    }
}

fn default_walkable() -> Option<ColorSignature> {
    Some(ColorSignature::reference(&[[255, 102, 0], [204, 102, 0]]))
}

fn default_obstacle() -> Option<ColorSignature> {
    Some(ColorSignature::reference(&[[0, 0, 0], [51, 51, 51]]))
}

fn default_hazard() -> Option<ColorSignature> {
    Some(ColorSignature::reference(&[[255, 255, 0]]))
}

/// Terrain classification settings (`[minimap]` section).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Minimap rectangle on screen
    #[serde(default = "default_region")]
    pub region: Region,

    /// Agent pixel inside the minimap
    #[serde(default = "default_player_center")]
    pub player_center: PixelPoint,

    /// Length of the strip checked by direction queries (pixels)
    #[serde(default = "default_check_distance")]
    pub check_distance: i32,

    /// Buffer next to the agent excluded from direction strips (pixels)
    #[serde(default = "default_safety_margin")]
    pub safety_margin: i32,

    /// Neighbourhood searched for obstacles around a candidate (pixels)
    #[serde(default = "default_safety_radius")]
    pub safety_radius: i32,

    /// Half width of direction strips (pixels)
    #[serde(default = "default_strip_half_width")]
    pub strip_half_width: i32,

    /// Maximum number of candidates kept per snapshot
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,

    /// Per-channel tolerance for reference colors
    #[serde(default = "default_color_tolerance")]
    pub color_tolerance: u8,

    #[serde(default)]
    pub colors: TerrainPalette,
}

impl TerrainConfig {
    pub fn geometry(&self) -> MinimapGeometry {
        MinimapGeometry::new(self.region, self.player_center)
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            player_center: default_player_center(),
            check_distance: default_check_distance(),
            safety_margin: default_safety_margin(),
            safety_radius: default_safety_radius(),
            strip_half_width: default_strip_half_width(),
            candidate_cap: default_candidate_cap(),
            color_tolerance: default_color_tolerance(),
            colors: TerrainPalette::default(),
        }
    }
}

fn default_region() -> Region {
    Region::new(0, 0, 106, 109)
}
fn default_player_center() -> PixelPoint {
    PixelPoint::new(53, 54)
}
fn default_check_distance() -> i32 {
    15
}
fn default_safety_margin() -> i32 {
    3
}
fn default_safety_radius() -> i32 {
    3
}
fn default_strip_half_width() -> i32 {
    5
}
fn default_candidate_cap() -> usize {
    200
}
fn default_color_tolerance() -> u8 {
    3
}
