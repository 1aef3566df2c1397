//! Destination planning.
//!
//! - [`PathfindingSystem`]: sector-weighted planner with a visit heatmap
//! - [`CandidateSelector`]: stateless strategies (random, farthest, by quadrant)

mod heatmap;
mod planner;
mod sector;
mod selection;
mod selector;

pub use heatmap::SectorHeatmap;
pub use planner::{PathfindingConfig, PathfindingStats, PathfindingSystem};
pub use sector::{Candidate, SECTOR_COUNT, Sector};
pub use selection::{WeightParams, choose_candidate, sector_weights};
pub use selector::{CandidateSelector, Quadrant};
