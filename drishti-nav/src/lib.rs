//! DrishtiNav - local visual navigation from a minimap
//!
//! Reads a small agent-centred minimap, decides where it is safe to walk,
//! dispatches walks and confirms arrival by watching the terrain stop
//! scrolling.
//!
//! ## Components
//!
//! - [`TerrainClassifier`]: color-based terrain classes, safe directions and
//!   safe destination candidates
//! - [`MotionDetector`]: frame differencing around the agent marker, with a
//!   polling wait that can be interrupted
//! - [`PathfindingSystem`]: sector-weighted destination choice with an
//!   anti-backtrack penalty and stuck detection
//! - [`MovementController`]: one navigation step at a time, retrying toward
//!   the opposite direction when stuck
//!
//! The embedding application supplies a [`RasterSource`], an [`Actuator`] and
//! an [`InterruptSignal`]; time flows through a [`Clock`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use drishti_nav::{ManualClock, MovementController, NavConfig, NoInterrupt, SimConfig, SimWorld};
//!
//! let config = NavConfig::default();
//! let clock = Arc::new(ManualClock::new());
//! let world = SimWorld::arena(400, 300, 1, &config.minimap, SimConfig::default(), clock.clone())?;
//! let (mut camera, mut legs) = (world.clone(), world);
//!
//! let mut controller = MovementController::from_config(&config, clock);
//! let steps = controller.explore_area(&mut camera, &mut legs, &NoInterrupt, 5);
//! println!("{steps} steps");
//! # Ok::<(), drishti_nav::NavError>(())
//! ```

pub mod clock;
pub mod config;
pub mod debug;
pub mod device;
pub mod error;
pub mod motion;
pub mod movement;
pub mod pathfinding;
pub mod raster;
pub mod sim;
pub mod terrain;
mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::NavConfig;
pub use device::{Actuator, InterruptFlag, InterruptSignal, NoInterrupt, RasterSource};
pub use error::{NavError, Result};
pub use motion::{MotionConfig, MotionDetector, MotionOutcome, MotionSample, WaitParams};
pub use movement::{
    MovementConfig, MovementController, MovementStats, NavigationStep, StepOutcome, StepState,
};
pub use pathfinding::{
    Candidate, CandidateSelector, PathfindingConfig, PathfindingStats, PathfindingSystem,
    Quadrant, Sector,
};
pub use raster::{LocalMap, PixelPoint, Region};
pub use sim::{SimConfig, SimWorld};
pub use terrain::{Direction, TerrainClass, TerrainClassifier, TerrainConfig};
