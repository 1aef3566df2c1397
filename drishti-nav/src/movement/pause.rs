//! Randomized pause after arriving at a destination.

use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Gaussian pause centred between the bounds and clamped to them.
///
/// The standard deviation is a quarter of the range, so about 95% of draws
/// fall inside the bounds before clamping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArrivalPause {
    min: Duration,
    max: Duration,
}

impl ArrivalPause {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_secs_f64();
        let max = self.max.as_secs_f64();
        let mean = (min + max) / 2.0;

        let drawn = match Normal::new(mean, (max - min) / 4.0) {
            Ok(normal) => normal.sample(rng),
            Err(_) => mean,
        };

        Duration::from_secs_f64(drawn.clamp(min, max))
    }
}
