//! Arrival confirmation by comparing consecutive minimap frames.
//!
//! The agent marker stays fixed while the terrain scrolls beneath it, so
//! movement shows up as change in an annulus around the marker. The inner
//! radius hides the marker itself; the outer radius keeps far-away animated
//! map details out of the comparison.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::device::{InterruptSignal, RasterSource};
use crate::raster::{LocalMap, luminance};
use crate::terrain::MinimapGeometry;

/// Motion detection settings (`[motion]` section).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Annulus inner radius around the agent (pixels)
    #[serde(default = "default_inner_radius")]
    pub inner_radius: f32,

    /// Annulus outer radius around the agent (pixels)
    #[serde(default = "default_outer_radius")]
    pub outer_radius: f32,

    /// Changed pixels at which the agent is considered moving
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: usize,

    /// Changed share of the annulus at which the agent is considered moving (%)
    #[serde(default = "default_percent_threshold")]
    pub percent_threshold: f32,

    /// Luminance of a pixel difference above which the pixel counts as changed
    #[serde(default = "default_noise_floor")]
    pub noise_floor: u8,

    /// Interval between frame comparisons (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive still comparisons required to confirm a stop
    #[serde(default = "default_required_still_reads")]
    pub required_still_reads: u32,
}

impl MotionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Wait parameters with this config's polling settings.
    pub fn wait_params(&self, timeout: Duration) -> WaitParams {
        WaitParams {
            timeout,
            poll_interval: self.poll_interval(),
            required_still_reads: self.required_still_reads,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            inner_radius: default_inner_radius(),
            outer_radius: default_outer_radius(),
            pixel_threshold: default_pixel_threshold(),
            percent_threshold: default_percent_threshold(),
            noise_floor: default_noise_floor(),
            poll_interval_ms: default_poll_interval_ms(),
            required_still_reads: default_required_still_reads(),
        }
    }
}

fn default_inner_radius() -> f32 {
    5.0
}
fn default_outer_radius() -> f32 {
    25.0
}
fn default_pixel_threshold() -> usize {
    30
}
fn default_percent_threshold() -> f32 {
    3.0
}
fn default_noise_floor() -> u8 {
    25
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_required_still_reads() -> u32 {
    3
}

/// Parameters of one [`MotionDetector::wait_until_stopped`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitParams {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub required_still_reads: u32,
}

/// Result of comparing two frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSample {
    /// Pixels in the annulus whose difference exceeds the noise floor
    pub changed: usize,
    /// Pixels in the annulus
    pub analyzed: usize,
    /// `changed / analyzed` in percent
    pub percent: f32,
    pub moving: bool,
}

/// How a wait for the agent to stop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Enough consecutive still frames observed
    Stopped,
    /// Timeout reached before a stop was confirmed
    TimedOut,
    /// The interrupt signal was raised
    Interrupted,
}

/// Frame-difference motion detector.
pub struct MotionDetector {
    config: MotionConfig,
    geometry: MinimapGeometry,
    clock: Arc<dyn Clock>,
}

impl MotionDetector {
    pub fn new(config: MotionConfig, geometry: MinimapGeometry, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            geometry,
            clock,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Compare two frames inside the annulus.
    ///
    /// Frames of different sizes cannot be compared and count as moving.
    pub fn sample(&self, previous: &LocalMap, current: &LocalMap) -> MotionSample {
        if previous.width() != current.width() || previous.height() != current.height() {
            return MotionSample {
                changed: 0,
                analyzed: 0,
                percent: 0.0,
                moving: true,
            };
        }

        let center = current.center();
        let inner = self.config.inner_radius;
        let outer = self.config.outer_radius;
        let mut changed = 0usize;
        let mut analyzed = 0usize;

        for (x, y, curr) in current.image().enumerate_pixels() {
            let dx = x as f32 - center.x as f32;
            let dy = y as f32 - center.y as f32;
            let d = (dx * dx + dy * dy).sqrt();
            if d < inner || d > outer {
                continue;
            }
            analyzed += 1;

            let prev = previous.image().get_pixel(x, y);
            let diff = [
                prev.0[0].abs_diff(curr.0[0]),
                prev.0[1].abs_diff(curr.0[1]),
                prev.0[2].abs_diff(curr.0[2]),
            ];
            if luminance(diff) > self.config.noise_floor {
                changed += 1;
            }
        }

        let percent = if analyzed > 0 {
            changed as f32 / analyzed as f32 * 100.0
        } else {
            0.0
        };
        let moving =
            changed >= self.config.pixel_threshold || percent > self.config.percent_threshold;

        MotionSample {
            changed,
            analyzed,
            percent,
            moving,
        }
    }

    /// Whether the terrain moved between two frames.
    pub fn is_moving(&self, previous: &LocalMap, current: &LocalMap) -> bool {
        let sample = self.sample(previous, current);
        tracing::debug!(
            "Minimap change: {} pixels ({:.1}% of {}) -> {}",
            sample.changed,
            sample.percent,
            sample.analyzed,
            if sample.moving { "moving" } else { "still" }
        );
        sample.moving
    }

    /// Poll frames until the agent is confirmed still.
    ///
    /// The interrupt is checked before every sleep and right after it, and
    /// wins over a timeout, so cancellation takes at most one poll interval.
    /// A frame that cannot be captured resets the still counter.
    pub fn wait_until_stopped(
        &self,
        source: &mut dyn RasterSource,
        params: WaitParams,
        interrupt: &dyn InterruptSignal,
    ) -> MotionOutcome {
        let start = self.clock.now();
        tracing::info!(
            "Waiting for the agent to stop (timeout {:.1}s, {} reads every {}ms)",
            params.timeout.as_secs_f32(),
            params.required_still_reads,
            params.poll_interval.as_millis()
        );

        let mut previous = self.geometry.capture(source);
        let mut still_reads = 0u32;

        loop {
            if interrupt.is_raised() {
                tracing::info!("Movement wait interrupted");
                return MotionOutcome::Interrupted;
            }
            let elapsed = self.clock.since(start);
            if elapsed >= params.timeout {
                tracing::warn!(
                    "Timeout: agent did not stop within {:.1}s",
                    params.timeout.as_secs_f32()
                );
                return MotionOutcome::TimedOut;
            }

            self.clock.sleep(params.poll_interval);

            if interrupt.is_raised() {
                tracing::info!("Movement wait interrupted");
                return MotionOutcome::Interrupted;
            }

            let current = self.geometry.capture(source);
            let elapsed = self.clock.since(start);
            let still = match (&previous, &current) {
                (Some(prev), Some(curr)) => !self.is_moving(prev, curr),
                _ => false,
            };

            if still {
                still_reads += 1;
                tracing::info!(
                    "Still: {}/{} reads (t={:.2}s)",
                    still_reads,
                    params.required_still_reads,
                    elapsed.as_secs_f32()
                );
                if still_reads >= params.required_still_reads {
                    tracing::info!("Agent confirmed stopped after {:.2}s", elapsed.as_secs_f32());
                    return MotionOutcome::Stopped;
                }
            } else {
                if still_reads > 0 {
                    tracing::info!(
                        "Movement detected, resetting still counter (was {}/{})",
                        still_reads,
                        params.required_still_reads
                    );
                } else {
                    tracing::debug!("Still moving (t={:.2}s)", elapsed.as_secs_f32());
                }
                still_reads = 0;
            }

            previous = current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::{InterruptFlag, NoInterrupt};
    use crate::raster::{PixelPoint, Region};
    use std::cell::Cell;
    use std::collections::VecDeque;

    const SIZE: u32 = 61;
    const FLOOR: [u8; 3] = [255, 102, 0];

    fn geometry() -> MinimapGeometry {
        MinimapGeometry::new(Region::new(0, 0, SIZE, SIZE), PixelPoint::new(30, 30))
    }

    fn detector(clock: Arc<ManualClock>) -> MotionDetector {
        MotionDetector::new(MotionConfig::default(), geometry(), clock)
    }

    fn floor() -> LocalMap {
        LocalMap::filled(SIZE, SIZE, PixelPoint::new(30, 30), FLOOR).unwrap()
    }

    /// Floor with a black bar whose position encodes the frame.
    fn scrolled(offset: i32) -> LocalMap {
        let mut map = floor();
        for y in 0..SIZE as i32 {
            for x in 0..4 {
                map.set_pixel(PixelPoint::new(10 + offset + x, y), [0, 0, 0]);
            }
        }
        map
    }

    /// Replays frames, repeating the last one forever.
    struct Script {
        frames: VecDeque<Option<LocalMap>>,
        captures: usize,
    }

    impl Script {
        fn new(frames: Vec<Option<LocalMap>>) -> Self {
            Self {
                frames: frames.into(),
                captures: 0,
            }
        }
    }

    impl RasterSource for Script {
        fn capture_region(&mut self, _region: Region) -> Option<image::RgbImage> {
            self.captures += 1;
            let frame = if self.frames.len() > 1 {
                self.frames.pop_front().flatten()
            } else {
                self.frames.front().cloned().flatten()
            };
            frame.map(LocalMap::into_image)
        }
    }

    fn params(timeout_ms: u64) -> WaitParams {
        MotionConfig::default().wait_params(Duration::from_millis(timeout_ms))
    }

    #[test]
    fn test_identical_frames_are_still() {
        let detector = detector(Arc::new(ManualClock::new()));
        let sample = detector.sample(&floor(), &floor());
        assert_eq!(sample.changed, 0);
        assert!(sample.analyzed > 0);
        assert!(!sample.moving);
    }

    #[test]
    fn test_scrolled_frames_are_moving() {
        let detector = detector(Arc::new(ManualClock::new()));
        assert!(detector.is_moving(&scrolled(0), &scrolled(6)));
    }

    #[test]
    fn test_changes_outside_annulus_ignored() {
        let detector = detector(Arc::new(ManualClock::new()));
        let mut marker = floor();
        // Agent marker blinking inside the inner radius
        for d in -2..=2 {
            marker.set_pixel(PixelPoint::new(30 + d, 30), [0, 0, 0]);
            marker.set_pixel(PixelPoint::new(30, 30 + d), [0, 0, 0]);
        }
        // Corner detail beyond the outer radius
        marker.set_pixel(PixelPoint::new(1, 1), [0, 0, 0]);

        let sample = detector.sample(&floor(), &marker);
        assert_eq!(sample.changed, 0);
    }

    #[test]
    fn test_small_change_below_thresholds() {
        let detector = detector(Arc::new(ManualClock::new()));
        let mut speck = floor();
        for x in 40..45 {
            speck.set_pixel(PixelPoint::new(x, 30), [0, 0, 0]);
        }
        let sample = detector.sample(&floor(), &speck);
        assert_eq!(sample.changed, 5);
        assert!(!sample.moving);
    }

    #[test]
    fn test_size_mismatch_counts_as_moving() {
        let detector = detector(Arc::new(ManualClock::new()));
        let small = LocalMap::filled(40, 40, PixelPoint::new(20, 20), FLOOR).unwrap();
        assert!(detector.is_moving(&floor(), &small));
    }

    #[test]
    fn test_stops_after_exactly_required_reads() {
        let clock = Arc::new(ManualClock::new());
        let detector = detector(clock.clone());
        let mut source = Script::new(vec![Some(floor())]);

        let outcome = detector.wait_until_stopped(&mut source, params(3000), &NoInterrupt);

        assert_eq!(outcome, MotionOutcome::Stopped);
        assert_eq!(clock.elapsed(), Duration::from_millis(750));
        assert_eq!(source.captures, 4);
    }

    #[test]
    fn test_moving_read_resets_counter() {
        let clock = Arc::new(ManualClock::new());
        let detector = detector(clock.clone());
        // Two still reads, then a scroll, then still again
        let mut source = Script::new(vec![
            Some(scrolled(0)),
            Some(scrolled(0)),
            Some(scrolled(0)),
            Some(scrolled(8)),
            Some(scrolled(8)),
        ]);

        let outcome = detector.wait_until_stopped(&mut source, params(3000), &NoInterrupt);

        assert_eq!(outcome, MotionOutcome::Stopped);
        // 2 still + 1 moving + 3 still
        assert_eq!(clock.elapsed(), Duration::from_millis(6 * 250));
    }

    #[test]
    fn test_unobservable_frame_resets_counter() {
        let clock = Arc::new(ManualClock::new());
        let detector = detector(clock.clone());
        let mut source = Script::new(vec![
            Some(floor()),
            Some(floor()),
            Some(floor()),
            None,
            Some(floor()),
        ]);

        let outcome = detector.wait_until_stopped(&mut source, params(3000), &NoInterrupt);

        assert_eq!(outcome, MotionOutcome::Stopped);
        // 2 still, blind, no previous frame, then 3 still
        assert_eq!(clock.elapsed(), Duration::from_millis(7 * 250));
    }

    #[test]
    fn test_times_out_while_moving() {
        let clock = Arc::new(ManualClock::new());
        let detector = detector(clock.clone());
        let frames = (0..40).map(|i| Some(scrolled((i % 2) * 8))).collect();
        let mut source = Script::new(frames);

        let outcome = detector.wait_until_stopped(&mut source, params(2000), &NoInterrupt);

        assert_eq!(outcome, MotionOutcome::TimedOut);
        assert_eq!(clock.elapsed(), Duration::from_millis(2000));
    }

    #[test]
    fn test_interrupt_wins_over_confirmation() {
        let clock = Arc::new(ManualClock::new());
        let detector = detector(clock.clone());
        let mut source = Script::new(vec![Some(floor())]);
        let polls = Cell::new(0);
        // Raised on the check right after the third sleep
        let interrupt = || {
            polls.set(polls.get() + 1);
            polls.get() >= 6
        };

        let outcome = detector.wait_until_stopped(&mut source, params(3000), &interrupt);

        assert_eq!(outcome, MotionOutcome::Interrupted);
        assert_eq!(clock.elapsed(), Duration::from_millis(750));
    }

    /// Raises the interrupt while the given capture is being taken.
    struct Threatened {
        script: Script,
        flag: InterruptFlag,
        raise_on: usize,
    }

    impl RasterSource for Threatened {
        fn capture_region(&mut self, region: Region) -> Option<image::RgbImage> {
            let frame = self.script.capture_region(region);
            if self.script.captures == self.raise_on {
                self.flag.raise();
            }
            frame
        }
    }

    #[test]
    fn test_interrupt_on_last_poll_beats_timeout() {
        let clock = Arc::new(ManualClock::new());
        let detector = detector(clock.clone());
        let flag = InterruptFlag::new();
        let frames = (0..40).map(|i| Some(scrolled((i % 2) * 8))).collect();
        // Initial capture plus 8 polls fill the 2000ms timeout
        let mut source = Threatened {
            script: Script::new(frames),
            flag: flag.clone(),
            raise_on: 9,
        };

        let outcome = detector.wait_until_stopped(&mut source, params(2000), &flag);

        assert_eq!(outcome, MotionOutcome::Interrupted);
        assert_eq!(clock.elapsed(), Duration::from_millis(2000));
    }

    #[test]
    fn test_interrupt_before_first_sleep() {
        let clock = Arc::new(ManualClock::new());
        let detector = detector(clock.clone());
        let mut source = Script::new(vec![Some(floor())]);

        let outcome = detector.wait_until_stopped(&mut source, params(3000), &|| true);

        assert_eq!(outcome, MotionOutcome::Interrupted);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
