//! Movement controller state machine.
//!
//! One navigation step: pick a destination, dispatch a walk, wait until the
//! minimap stops scrolling, then pause. A walk that times out is retried
//! toward the opposite direction a bounded number of times.
//!
//! ```text
//! Idle -> Dispatched -> AwaitingArrival -> Arrived
//!                                       -> StuckRetry(n) -> Dispatched ...
//!                                       -> Failed
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::NavConfig;
use crate::device::{Actuator, InterruptSignal, RasterSource};
use crate::motion::{MotionDetector, MotionOutcome};
use crate::pathfinding::{Candidate, PathfindingStats, PathfindingSystem};
use crate::terrain::{MinimapGeometry, TerrainClassifier};

use super::pause::ArrivalPause;

/// Movement settings (`[movement]` section).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Master switch; a disabled controller never moves
    #[serde(default = "default_enable")]
    pub enable: bool,

    /// Lower bound of the post-arrival pause (milliseconds)
    #[serde(default = "default_pause_min_ms")]
    pub pause_after_arrival_min_ms: u64,

    /// Upper bound of the post-arrival pause (milliseconds)
    #[serde(default = "default_pause_max_ms")]
    pub pause_after_arrival_max_ms: u64,

    /// Wait after a dispatch before polling for motion (milliseconds)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Stuck retries per step, each toward the opposite direction
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minimum time between movement cycles (milliseconds)
    #[serde(default = "default_move_cooldown_ms")]
    pub move_cooldown_ms: u64,

    /// Minimum time since the last fight before moving (milliseconds)
    #[serde(default = "default_calm_period_ms")]
    pub calm_period_ms: u64,
}

impl MovementConfig {
    pub fn arrival_pause(&self) -> ArrivalPause {
        ArrivalPause::new(
            Duration::from_millis(self.pause_after_arrival_min_ms),
            Duration::from_millis(self.pause_after_arrival_max_ms),
        )
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            enable: default_enable(),
            pause_after_arrival_min_ms: default_pause_min_ms(),
            pause_after_arrival_max_ms: default_pause_max_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            max_retries: default_max_retries(),
            move_cooldown_ms: default_move_cooldown_ms(),
            calm_period_ms: default_calm_period_ms(),
        }
    }
}

fn default_enable() -> bool {
    true
}
fn default_pause_min_ms() -> u64 {
    1000
}
fn default_pause_max_ms() -> u64 {
    3000
}
fn default_settle_delay_ms() -> u64 {
    400
}
fn default_max_retries() -> u32 {
    2
}
fn default_move_cooldown_ms() -> u64 {
    300
}
fn default_calm_period_ms() -> u64 {
    800
}

/// Controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepState {
    /// No step in progress
    Idle,
    /// Walk command accepted, waiting for the client to react
    Dispatched,
    /// Polling the minimap for the agent to stop
    AwaitingArrival,
    /// Last step reached its destination
    Arrived,
    /// Stuck; retrying toward the opposite direction (attempt n)
    StuckRetry(u32),
    /// Last step failed
    Failed,
}

/// How a navigation step ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Motion stopped at the destination
    Arrived,
    /// The interrupt signal aborted the wait
    Interrupted,
    /// Timed out without the stuck condition
    TimedOut,
    /// Stuck on every attempt
    Exhausted,
    /// Nothing safe to walk to (or the minimap could not be observed)
    NoCandidate,
    /// The actuator refused the command
    DispatchRejected,
    /// Movement is turned off in the configuration
    Disabled,
}

impl StepOutcome {
    pub fn is_success(self) -> bool {
        self == StepOutcome::Arrived
    }
}

/// Report of one [`MovementController::walk_to_target`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigationStep {
    pub outcome: StepOutcome,
    /// Last destination dispatched, if any
    pub target: Option<Candidate>,
    /// Stuck retries used
    pub retries: u32,
    /// Post-arrival pause taken
    pub pause: Option<Duration>,
}

impl NavigationStep {
    fn finished(outcome: StepOutcome, target: Option<Candidate>, retries: u32) -> Self {
        Self {
            outcome,
            target,
            retries,
            pause: None,
        }
    }
}

/// Snapshot of controller statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct MovementStats {
    pub enabled: bool,
    pub is_moving: bool,
    pub state: StepState,
    /// Steps that reached their destination
    pub successful_steps: u64,
    /// Stuck retries over all steps
    pub total_retries: u64,
    /// When the last successful step finished
    pub last_movement: Option<Instant>,
    pub pathfinding: PathfindingStats,
}

/// Drives navigation steps against a raster source and an actuator.
pub struct MovementController {
    config: MovementConfig,
    pathfinding: PathfindingSystem,
    motion: MotionDetector,
    geometry: MinimapGeometry,
    clock: Arc<dyn Clock>,
    pause: ArrivalPause,
    rng: StdRng,

    state: StepState,
    is_moving: bool,
    last_movement: Option<Instant>,
    successful_steps: u64,
    total_retries: u64,
}

impl MovementController {
    pub fn new(
        config: MovementConfig,
        pathfinding: PathfindingSystem,
        motion: MotionDetector,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let geometry = pathfinding.classifier().geometry();
        let rng = match pathfinding.config().seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_os_rng(),
        };

        if config.enable {
            tracing::info!(
                "Automatic movement enabled (pause {}-{}ms, {} retries)",
                config.pause_after_arrival_min_ms,
                config.pause_after_arrival_max_ms,
                config.max_retries
            );
        } else {
            tracing::info!("Automatic movement disabled");
        }

        Self {
            pause: config.arrival_pause(),
            config,
            pathfinding,
            motion,
            geometry,
            clock,
            rng,
            state: StepState::Idle,
            is_moving: false,
            last_movement: None,
            successful_steps: 0,
            total_retries: 0,
        }
    }

    /// Build the whole navigation stack from one configuration.
    pub fn from_config(config: &NavConfig, clock: Arc<dyn Clock>) -> Self {
        let classifier = TerrainClassifier::new(config.minimap.clone());
        let motion = MotionDetector::new(
            config.motion.clone(),
            config.minimap.geometry(),
            clock.clone(),
        );
        let pathfinding =
            PathfindingSystem::new(config.pathfinding.clone(), classifier, clock.clone());
        Self::new(config.movement.clone(), pathfinding, motion, clock)
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    pub fn pathfinding(&self) -> &PathfindingSystem {
        &self.pathfinding
    }

    pub fn pathfinding_mut(&mut self) -> &mut PathfindingSystem {
        &mut self.pathfinding
    }

    pub fn motion(&self) -> &MotionDetector {
        &self.motion
    }

    /// Whether a new movement cycle may start.
    pub fn should_move(&self, time_since_last_combat: Duration) -> bool {
        if !self.config.enable {
            return false;
        }

        if let Some(last) = self.last_movement
            && self.clock.since(last) < Duration::from_millis(self.config.move_cooldown_ms)
        {
            return false;
        }

        time_since_last_combat >= Duration::from_millis(self.config.calm_period_ms)
    }

    /// Walk to one destination.
    ///
    /// The first attempt uses sector weighting; every stuck retry picks the
    /// destination opposite to the previous one.
    pub fn walk_to_target(
        &mut self,
        source: &mut dyn RasterSource,
        actuator: &mut dyn Actuator,
        interrupt: &dyn InterruptSignal,
        max_retries: u32,
    ) -> NavigationStep {
        if !self.config.enable {
            return NavigationStep::finished(StepOutcome::Disabled, None, 0);
        }

        let mut retries = 0u32;
        let mut last_target = None;

        loop {
            let target = if retries == 0 {
                self.pathfinding.next_candidate(source)
            } else {
                tracing::info!("Trying the opposite direction");
                self.pathfinding.opposite_candidate(source)
            };

            let Some(target) = target else {
                tracing::warn!("No destination available");
                return self.fail(StepOutcome::NoCandidate, last_target, retries);
            };
            last_target = Some(target);

            let screen = target.absolute(self.geometry.region);
            tracing::info!(
                "Walking to ({}, {}) on the minimap, ({}, {}) on screen",
                target.point.x,
                target.point.y,
                screen.x,
                screen.y
            );

            if !actuator.move_to(&target) {
                tracing::error!("Walk command rejected");
                return self.fail(StepOutcome::DispatchRejected, last_target, retries);
            }

            self.state = StepState::Dispatched;
            self.clock
                .sleep(Duration::from_millis(self.config.settle_delay_ms));

            self.state = StepState::AwaitingArrival;
            self.is_moving = true;
            let start = self.clock.now();
            let params = self
                .motion
                .config()
                .wait_params(self.pathfinding.config().stuck_threshold());
            let outcome = self.motion.wait_until_stopped(source, params, interrupt);
            self.is_moving = false;

            match outcome {
                MotionOutcome::Stopped => {
                    tracing::info!("Arrived at destination");
                    let pause = self.pause.sample(&mut self.rng);
                    self.clock.sleep(pause);

                    self.state = StepState::Arrived;
                    self.last_movement = Some(self.clock.now());
                    self.successful_steps += 1;
                    return NavigationStep {
                        outcome: StepOutcome::Arrived,
                        target: last_target,
                        retries,
                        pause: Some(pause),
                    };
                }
                MotionOutcome::Interrupted => {
                    return self.fail(StepOutcome::Interrupted, last_target, retries);
                }
                MotionOutcome::TimedOut => {
                    if !self.pathfinding.is_stuck(start) {
                        tracing::warn!("Timed out waiting for arrival");
                        return self.fail(StepOutcome::TimedOut, last_target, retries);
                    }
                    if interrupt.is_raised() {
                        tracing::info!("Interrupted while stuck, not retrying");
                        return self.fail(StepOutcome::Interrupted, last_target, retries);
                    }

                    retries += 1;
                    if retries > max_retries {
                        tracing::error!("Still stuck after {} retries", max_retries);
                        return self.fail(StepOutcome::Exhausted, last_target, max_retries);
                    }

                    self.total_retries += 1;
                    tracing::warn!("Retry {}/{} after getting stuck", retries, max_retries);
                    self.state = StepState::StuckRetry(retries);
                }
            }
        }
    }

    /// Walk up to `max_steps` destinations, stopping at the first failure.
    ///
    /// Returns the number of steps that arrived.
    pub fn explore_area(
        &mut self,
        source: &mut dyn RasterSource,
        actuator: &mut dyn Actuator,
        interrupt: &dyn InterruptSignal,
        max_steps: usize,
    ) -> usize {
        if !self.config.enable {
            return 0;
        }

        tracing::info!("Exploring area ({} steps max)", max_steps);
        let mut done = 0;

        for _ in 0..max_steps {
            let step = self.walk_to_target(source, actuator, interrupt, self.config.max_retries);
            if !step.outcome.is_success() {
                tracing::info!("Exploration stopped: {:?}", step.outcome);
                break;
            }
            done += 1;
        }

        if done > 0 {
            tracing::info!("Exploration finished: {}/{} steps", done, max_steps);
        }
        done
    }

    /// Mark any ongoing movement as stopped.
    pub fn stop(&mut self) {
        self.is_moving = false;
        self.state = StepState::Idle;
    }

    pub fn stats(&self) -> MovementStats {
        MovementStats {
            enabled: self.config.enable,
            is_moving: self.is_moving,
            state: self.state,
            successful_steps: self.successful_steps,
            total_retries: self.total_retries,
            last_movement: self.last_movement,
            pathfinding: self.pathfinding.stats(),
        }
    }

    fn fail(
        &mut self,
        outcome: StepOutcome,
        target: Option<Candidate>,
        retries: u32,
    ) -> NavigationStep {
        self.state = StepState::Failed;
        self.is_moving = false;
        NavigationStep::finished(outcome, target, retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::{InterruptFlag, NoInterrupt};
    use crate::motion::MotionConfig;
    use crate::pathfinding::PathfindingConfig;
    use crate::raster::{LocalMap, PixelPoint, Region};
    use crate::terrain::TerrainConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    const SIZE: u32 = 81;
    const FLOOR: [u8; 3] = [255, 102, 0];

    fn nav_config() -> NavConfig {
        NavConfig {
            minimap: TerrainConfig {
                region: Region::new(100, 50, SIZE, SIZE),
                player_center: PixelPoint::new(40, 40),
                ..TerrainConfig::default()
            },
            motion: MotionConfig::default(),
            pathfinding: PathfindingConfig {
                seed: Some(21),
                ..PathfindingConfig::default()
            },
            movement: MovementConfig::default(),
        }
    }

    /// Open floor with a bar that moves whenever `scroll` is set.
    fn frame(offset: i32) -> image::RgbImage {
        let mut map = LocalMap::filled(SIZE, SIZE, PixelPoint::new(40, 40), FLOOR).unwrap();
        for y in 0..SIZE as i32 {
            for x in 0..3 {
                map.set_pixel(PixelPoint::new(20 + offset + x, y), [0, 0, 0]);
            }
        }
        map.into_image()
    }

    /// Scripted world: the minimap scrolls for `moving_frames` captures after
    /// each accepted dispatch, or forever when `stuck` is set.
    #[derive(Default)]
    struct World {
        moving_frames: u32,
        remaining: u32,
        stuck: bool,
        blind: bool,
        reject: bool,
        offset: i32,
        dispatched: Vec<Candidate>,
        captures: usize,
        /// Raised while the given capture is taken
        threat: Option<(usize, InterruptFlag)>,
    }

    struct Camera(Rc<RefCell<World>>);
    struct Driver(Rc<RefCell<World>>);

    impl RasterSource for Camera {
        fn capture_region(&mut self, region: Region) -> Option<image::RgbImage> {
            assert_eq!(region, Region::new(100, 50, SIZE, SIZE));
            let mut world = self.0.borrow_mut();
            world.captures += 1;
            if let Some((at, flag)) = &world.threat
                && *at == world.captures
            {
                flag.raise();
            }
            if world.blind {
                return None;
            }
            if world.stuck || world.remaining > 0 {
                world.remaining = world.remaining.saturating_sub(1);
                world.offset = (world.offset + 4) % 16;
            }
            Some(frame(world.offset))
        }
    }

    impl Actuator for Driver {
        fn move_to(&mut self, target: &Candidate) -> bool {
            let mut world = self.0.borrow_mut();
            if world.reject {
                return false;
            }
            world.remaining = world.moving_frames;
            world.dispatched.push(*target);
            true
        }
    }

    fn setup(
        world: World,
    ) -> (Arc<ManualClock>, MovementController, Camera, Driver, Rc<RefCell<World>>) {
        let clock = Arc::new(ManualClock::new());
        let controller = MovementController::from_config(&nav_config(), clock.clone());
        let world = Rc::new(RefCell::new(world));
        (
            clock,
            controller,
            Camera(world.clone()),
            Driver(world.clone()),
            world,
        )
    }

    #[test]
    fn test_walk_arrives_and_pauses() {
        let (clock, mut controller, mut camera, mut driver, world) = setup(World {
            moving_frames: 3,
            ..World::default()
        });

        let step = controller.walk_to_target(&mut camera, &mut driver, &NoInterrupt, 2);

        assert_eq!(step.outcome, StepOutcome::Arrived);
        assert_eq!(step.retries, 0);
        let pause = step.pause.unwrap();
        assert!(pause >= Duration::from_millis(1000) && pause <= Duration::from_millis(3000));
        assert_eq!(world.borrow().dispatched.len(), 1);
        assert_eq!(step.target, world.borrow().dispatched.first().copied());
        assert_eq!(controller.state(), StepState::Arrived);
        assert!(!controller.is_moving());
        assert_eq!(controller.stats().successful_steps, 1);
        // settle + at least three still polls + pause
        assert!(clock.elapsed() >= Duration::from_millis(400 + 750) + pause);
    }

    #[test]
    fn test_stuck_retries_then_exhausts() {
        let (_clock, mut controller, mut camera, mut driver, world) = setup(World {
            stuck: true,
            ..World::default()
        });

        let step = controller.walk_to_target(&mut camera, &mut driver, &NoInterrupt, 2);

        assert_eq!(step.outcome, StepOutcome::Exhausted);
        assert_eq!(step.retries, 2);
        assert_eq!(world.borrow().dispatched.len(), 3);
        assert_eq!(controller.state(), StepState::Failed);

        let stats = controller.stats();
        assert_eq!(stats.total_retries, 2);
        assert_eq!(stats.pathfinding.stuck_count, 3);
        assert_eq!(stats.pathfinding.total_paths, 1);

        // Each retry heads away from the previous destination
        let dispatched = world.borrow().dispatched.clone();
        for pair in dispatched.windows(2) {
            assert!(pair[0].offset.dot(&pair[1].offset) < 0);
        }
    }

    #[test]
    fn test_interrupt_is_not_retried() {
        let (_clock, mut controller, mut camera, mut driver, world) = setup(World {
            stuck: true,
            ..World::default()
        });
        let flag = InterruptFlag::new();
        flag.raise();

        let step = controller.walk_to_target(&mut camera, &mut driver, &flag, 2);

        assert_eq!(step.outcome, StepOutcome::Interrupted);
        assert_eq!(world.borrow().dispatched.len(), 1);
        assert_eq!(controller.stats().total_retries, 0);
    }

    #[test]
    fn test_interrupt_during_last_poll_is_not_retried() {
        let flag = InterruptFlag::new();
        // Candidates, first wait frame, then 12 polls fill the stuck timeout
        let (_clock, mut controller, mut camera, mut driver, world) = setup(World {
            stuck: true,
            threat: Some((14, flag.clone())),
            ..World::default()
        });

        let step = controller.walk_to_target(&mut camera, &mut driver, &flag, 2);

        assert_eq!(step.outcome, StepOutcome::Interrupted);
        assert_eq!(world.borrow().captures, 14);
        assert_eq!(world.borrow().dispatched.len(), 1);
        let stats = controller.stats();
        assert_eq!(stats.total_retries, 0);
        assert_eq!(stats.pathfinding.stuck_count, 0);
    }

    #[test]
    fn test_rejected_dispatch_fails_immediately() {
        let (clock, mut controller, mut camera, mut driver, _world) = setup(World {
            reject: true,
            ..World::default()
        });

        let step = controller.walk_to_target(&mut camera, &mut driver, &NoInterrupt, 2);

        assert_eq!(step.outcome, StepOutcome::DispatchRejected);
        assert!(step.target.is_some());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_blind_source_has_no_candidate() {
        let (_clock, mut controller, mut camera, mut driver, world) = setup(World {
            blind: true,
            ..World::default()
        });

        let step = controller.walk_to_target(&mut camera, &mut driver, &NoInterrupt, 2);

        assert_eq!(step.outcome, StepOutcome::NoCandidate);
        assert!(world.borrow().dispatched.is_empty());
        assert_eq!(controller.explore_area(&mut camera, &mut driver, &NoInterrupt, 5), 0);
    }

    #[test]
    fn test_explore_counts_successes() {
        let (_clock, mut controller, mut camera, mut driver, world) = setup(World {
            moving_frames: 2,
            ..World::default()
        });

        let done = controller.explore_area(&mut camera, &mut driver, &NoInterrupt, 4);

        assert_eq!(done, 4);
        assert_eq!(world.borrow().dispatched.len(), 4);
        assert_eq!(controller.stats().pathfinding.total_paths, 4);
    }

    #[test]
    fn test_explore_stops_at_first_failure() {
        let (_clock, mut controller, mut camera, mut driver, world) = setup(World {
            moving_frames: 2,
            ..World::default()
        });

        assert_eq!(controller.explore_area(&mut camera, &mut driver, &NoInterrupt, 2), 2);
        world.borrow_mut().stuck = true;
        assert_eq!(controller.explore_area(&mut camera, &mut driver, &NoInterrupt, 3), 0);
        assert_eq!(controller.state(), StepState::Failed);
    }

    #[test]
    fn test_should_move_gating() {
        let (clock, mut controller, mut camera, mut driver, _world) = setup(World::default());

        assert!(!controller.should_move(Duration::from_millis(500)));
        assert!(controller.should_move(Duration::from_millis(800)));

        controller.walk_to_target(&mut camera, &mut driver, &NoInterrupt, 0);
        assert!(!controller.should_move(Duration::from_secs(10)));
        clock.advance(Duration::from_millis(300));
        assert!(controller.should_move(Duration::from_secs(10)));
    }

    #[test]
    fn test_disabled_never_moves() {
        let clock = Arc::new(ManualClock::new());
        let mut config = nav_config();
        config.movement.enable = false;
        let mut controller = MovementController::from_config(&config, clock);
        let world = Rc::new(RefCell::new(World::default()));
        let mut camera = Camera(world.clone());
        let mut driver = Driver(world.clone());

        assert!(!controller.should_move(Duration::from_secs(10)));
        let step = controller.walk_to_target(&mut camera, &mut driver, &NoInterrupt, 2);
        assert_eq!(step.outcome, StepOutcome::Disabled);
        assert_eq!(controller.explore_area(&mut camera, &mut driver, &NoInterrupt, 3), 0);
        assert!(world.borrow().dispatched.is_empty());
    }

    #[test]
    fn test_stop_clears_motion_flag() {
        let (_clock, mut controller, _camera, _driver, _world) = setup(World::default());
        controller.stop();
        assert!(!controller.stats().is_moving);
        assert_eq!(controller.state(), StepState::Idle);
    }
}
