//! Movement control: dispatch, arrival confirmation and stuck recovery.

mod controller;
mod pause;

pub use controller::{
    MovementConfig, MovementController, MovementStats, NavigationStep, StepOutcome, StepState,
};
pub use pause::ArrivalPause;
