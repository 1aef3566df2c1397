//! Terrain classification on minimap snapshots.

mod classifier;
mod config;

pub use classifier::{
    ClassifierStats, Direction, PointClass, TerrainClass, TerrainClassifier, TerrainMasks,
};
pub use config::{MinimapGeometry, TerrainConfig, TerrainPalette};
