//! Simulated minimap world for offline runs and tests.
//!
//! A large terrain raster stands in for the game world. The agent walks in a
//! straight line toward the last dispatched target at a fixed speed and stops
//! at the first non-walkable pixel. Captures render the window around the
//! agent, so the terrain scrolls exactly like a real minimap.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::Clock;
use crate::device::{Actuator, RasterSource};
use crate::error::{NavError, Result};
use crate::pathfinding::Candidate;
use crate::raster::{Mask, PixelPoint, Region};
use crate::terrain::{MinimapGeometry, TerrainClass, TerrainConfig};

const FALLBACK_WALKABLE: [u8; 3] = [255, 102, 0];
const FALLBACK_OBSTACLE: [u8; 3] = [0, 0, 0];
const FALLBACK_HAZARD: [u8; 3] = [255, 255, 0];
const MARKER: Rgb<u8> = Rgb([255, 255, 255]);

/// Simulation parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    /// Walking speed (world pixels per second)
    pub speed: f32,
    /// Dispatches the world refuses (every n-th, 0 = never)
    pub reject_every: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            speed: 40.0,
            reject_every: 0,
        }
    }
}

/// Counters of one simulation run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimStats {
    pub captures: u64,
    pub dispatches: u64,
    pub rejected: u64,
    /// Walks that ended against a non-walkable pixel
    pub blocked: u64,
    /// Distance walked (world pixels)
    pub distance: f32,
}

struct WorldState {
    terrain: RgbImage,
    walkable: Mask,
    void_color: [u8; 3],
    geometry: MinimapGeometry,
    config: SimConfig,

    position: (f32, f32),
    target: Option<(f32, f32)>,
    last_update: Instant,
    stats: SimStats,
}

impl WorldState {
    /// Advance the agent to `now`.
    fn update(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        let Some((tx, ty)) = self.target else {
            return;
        };

        let mut budget = self.config.speed * dt;
        while budget > 0.0 {
            let (x, y) = self.position;
            let (dx, dy) = (tx - x, ty - y);
            let remaining = (dx * dx + dy * dy).sqrt();
            if remaining < 0.5 {
                self.position = (tx, ty);
                self.target = None;
                return;
            }

            let step = budget.min(1.0).min(remaining);
            let next = (x + dx / remaining * step, y + dy / remaining * step);
            let cell = PixelPoint::new(next.0.round() as i32, next.1.round() as i32);
            if !self.walkable.contains(cell) {
                tracing::debug!("Simulated agent blocked at ({}, {})", cell.x, cell.y);
                self.stats.blocked += 1;
                self.target = None;
                return;
            }

            self.position = next;
            self.stats.distance += step;
            budget -= step;
        }
    }

    fn agent_pixel(&self) -> PixelPoint {
        PixelPoint::new(self.position.0.round() as i32, self.position.1.round() as i32)
    }

    fn render(&self, region: Region) -> RgbImage {
        let agent = self.agent_pixel();
        let center = self.geometry.center;
        let (w, h) = (self.terrain.width() as i32, self.terrain.height() as i32);

        let mut view = RgbImage::from_fn(region.width, region.height, |x, y| {
            let wx = agent.x + x as i32 - center.x;
            let wy = agent.y + y as i32 - center.y;
            if wx >= 0 && wy >= 0 && wx < w && wy < h {
                *self.terrain.get_pixel(wx as u32, wy as u32)
            } else {
                Rgb(self.void_color)
            }
        });

        // Agent marker: a small cross
        for d in -1..=1 {
            for (x, y) in [(center.x + d, center.y), (center.x, center.y + d)] {
                if x >= 0 && y >= 0 && (x as u32) < view.width() && (y as u32) < view.height() {
                    view.put_pixel(x as u32, y as u32, MARKER);
                }
            }
        }
        view
    }
}

/// Handle to a simulated world.
///
/// Clones share the same world, so one clone can serve as the raster source
/// while another acts as the actuator.
#[derive(Clone)]
pub struct SimWorld {
    state: Arc<Mutex<WorldState>>,
    clock: Arc<dyn Clock>,
}

impl SimWorld {
    /// Build a world from a terrain raster.
    ///
    /// The agent starts on the walkable pixel closest to `start`.
    pub fn new(
        terrain: RgbImage,
        minimap: &TerrainConfig,
        start: PixelPoint,
        config: SimConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let Some(walkable_rule) = minimap.colors.signature(TerrainClass::Walkable) else {
            return Err(NavError::Config(
                "simulation needs a walkable color rule".into(),
            ));
        };
        let walkable = Mask::from_fn(terrain.width(), terrain.height(), |x, y| {
            walkable_rule.matches(terrain.get_pixel(x, y).0, minimap.color_tolerance)
        });

        let position = walkable
            .points()
            .min_by_key(|p| {
                let d = *p - start;
                d.x as i64 * d.x as i64 + d.y as i64 * d.y as i64
            })
            .ok_or_else(|| NavError::Config("terrain has no walkable pixel".into()))?;

        tracing::info!(
            "Simulated world {}x{}, agent at ({}, {})",
            terrain.width(),
            terrain.height(),
            position.x,
            position.y
        );

        let void_color = minimap
            .colors
            .representative(TerrainClass::Obstacle)
            .unwrap_or(FALLBACK_OBSTACLE);

        let state = WorldState {
            terrain,
            walkable,
            void_color,
            geometry: minimap.geometry(),
            config,
            position: (position.x as f32, position.y as f32),
            target: None,
            last_update: clock.now(),
            stats: SimStats::default(),
        };

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            clock,
        })
    }

    /// Load a terrain PNG; the agent starts near the image center.
    pub fn load<P: AsRef<Path>>(
        path: P,
        minimap: &TerrainConfig,
        config: SimConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let terrain = image::open(path.as_ref())?.into_rgb8();
        let start = PixelPoint::new(terrain.width() as i32 / 2, terrain.height() as i32 / 2);
        Self::new(terrain, minimap, start, config, clock)
    }

    /// Generate a walled arena with pillars and hazard pools.
    pub fn arena(
        width: u32,
        height: u32,
        seed: u64,
        minimap: &TerrainConfig,
        config: SimConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let terrain = generate_arena(width, height, seed, minimap);
        let start = PixelPoint::new(width as i32 / 2, height as i32 / 2);
        Self::new(terrain, minimap, start, config, clock)
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        // A panic while holding the lock leaves the world consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Agent position in world pixels (after advancing to now).
    pub fn position(&self) -> PixelPoint {
        let mut state = self.lock();
        state.update(self.clock.now());
        state.agent_pixel()
    }

    /// Whether the agent is still walking.
    pub fn is_walking(&self) -> bool {
        let mut state = self.lock();
        state.update(self.clock.now());
        state.target.is_some()
    }

    pub fn stats(&self) -> SimStats {
        self.lock().stats.clone()
    }

    /// The full terrain raster.
    pub fn terrain(&self) -> RgbImage {
        self.lock().terrain.clone()
    }
}

impl RasterSource for SimWorld {
    fn capture_region(&mut self, region: Region) -> Option<RgbImage> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.update(now);
        state.stats.captures += 1;
        Some(state.render(region))
    }
}

impl Actuator for SimWorld {
    fn move_to(&mut self, target: &Candidate) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        state.update(now);
        state.stats.dispatches += 1;

        let every = state.config.reject_every;
        if every > 0 && state.stats.dispatches % every as u64 == 0 {
            state.stats.rejected += 1;
            return false;
        }

        let (x, y) = state.position;
        let goal = (x + target.offset.x as f32, y + target.offset.y as f32);
        tracing::debug!(
            "Simulated walk from ({:.0}, {:.0}) to ({:.0}, {:.0})",
            x,
            y,
            goal.0,
            goal.1
        );
        state.target = Some(goal);
        true
    }
}

/// Terrain raster for [`SimWorld::arena`].
pub fn generate_arena(width: u32, height: u32, seed: u64, minimap: &TerrainConfig) -> RgbImage {
    let colors = &minimap.colors;
    let floor = Rgb(colors
        .representative(TerrainClass::Walkable)
        .unwrap_or(FALLBACK_WALKABLE));
    let wall = Rgb(colors
        .representative(TerrainClass::Obstacle)
        .unwrap_or(FALLBACK_OBSTACLE));
    let hazard = Rgb(colors
        .representative(TerrainClass::Hazard)
        .unwrap_or(FALLBACK_HAZARD));

    let mut rng = StdRng::seed_from_u64(seed);
    let mut image = RgbImage::from_pixel(width, height, floor);

    let border = 4;
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x < border || y < border || x + border >= width || y + border >= height {
            *pixel = wall;
        }
    }

    let (cx, cy) = (width as i32 / 2, height as i32 / 2);
    let mut place = |image: &mut RgbImage, color: Rgb<u8>, max_size: u32, count: usize| {
        for _ in 0..count {
            if width < 2 * border + max_size + 2 || height < 2 * border + max_size + 2 {
                return;
            }
            let w = rng.random_range(3..=max_size);
            let h = rng.random_range(3..=max_size);
            let x0 = rng.random_range(border..width - border - w);
            let y0 = rng.random_range(border..height - border - h);

            // Keep the spawn area clear
            let near_spawn = (x0 as i32 - 8..x0 as i32 + w as i32 + 8).contains(&cx)
                && (y0 as i32 - 8..y0 as i32 + h as i32 + 8).contains(&cy);
            if near_spawn {
                continue;
            }

            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    image.put_pixel(x, y, color);
                }
            }
        }
    };

    let area = (width as usize * height as usize).max(1);
    place(&mut image, wall, 12, area / 2500);
    place(&mut image, hazard, 8, area / 6000);
    image
}
