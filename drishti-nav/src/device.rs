//! Interfaces to the outside world.
//!
//! The navigation core never talks to hardware directly. Implement these
//! traits to connect it to a screen grabber, an input injector and whatever
//! decides that movement must stop (e.g. a threat detector).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;

use crate::pathfinding::Candidate;
use crate::raster::Region;

/// Source of minimap frames.
///
/// # Example
///
/// ```ignore
/// struct ScreenGrabber { /* capture handle */ }
///
/// impl RasterSource for ScreenGrabber {
///     fn capture_region(&mut self, region: Region) -> Option<RgbImage> {
///         self.grab(region.x, region.y, region.width, region.height).ok()
///     }
/// }
/// ```
pub trait RasterSource {
    /// Capture the given screen rectangle.
    ///
    /// Returns `None` when nothing can be observed right now. Callers treat
    /// that as "unknown", never as "safe".
    fn capture_region(&mut self, region: Region) -> Option<RgbImage>;
}

/// Movement command sink.
pub trait Actuator {
    /// Dispatch a walk toward `target`.
    ///
    /// Fire-and-forget: `true` only means the command was accepted, not that
    /// the agent arrived.
    fn move_to(&mut self, target: &Candidate) -> bool;
}

/// Polled predicate that aborts an ongoing movement wait.
pub trait InterruptSignal {
    fn is_raised(&self) -> bool;
}

impl<F> InterruptSignal for F
where
    F: Fn() -> bool,
{
    fn is_raised(&self) -> bool {
        self()
    }
}

/// Interrupt that never fires.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInterrupt;

impl InterruptSignal for NoInterrupt {
    fn is_raised(&self) -> bool {
        false
    }
}

/// Shareable interrupt flag, raised from any thread.
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the current wait stop.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Re-arm the flag.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InterruptSignal for InterruptFlag {
    fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_interrupt() {
        let threat = std::cell::Cell::new(false);
        let signal = || threat.get();
        assert!(!signal.is_raised());
        threat.set(true);
        assert!(signal.is_raised());
    }

    #[test]
    fn test_interrupt_flag_shared() {
        let flag = InterruptFlag::new();
        let other = flag.clone();
        assert!(!flag.is_raised());
        other.raise();
        assert!(flag.is_raised());
        flag.clear();
        assert!(!other.is_raised());
        assert!(!NoInterrupt.is_raised());
    }
}
