//! DrishtiNav - command line front end
//!
//! - `explore`: run the navigation loop against a simulated world
//! - `inspect`: classify a captured minimap PNG and write calibration images

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use drishti_nav::debug::{CoverageReport, render_mask, render_overlay};
use drishti_nav::{
    Clock, InterruptFlag, LocalMap, ManualClock, MovementController, NavConfig, NavError,
    PixelPoint, Result, SimConfig, SimWorld, SystemClock, TerrainClassifier,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Explore a simulated world
    Explore {
        /// Terrain PNG; a generated arena is used when omitted
        #[arg(short, long)]
        terrain: Option<PathBuf>,

        /// Generated arena width (pixels)
        #[arg(long, default_value = "400")]
        width: u32,

        /// Generated arena height (pixels)
        #[arg(long, default_value = "300")]
        height: u32,

        /// Arena seed
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Maximum navigation steps
        #[arg(long, default_value = "10")]
        steps: usize,

        /// Agent speed (pixels per second)
        #[arg(long, default_value = "40.0")]
        speed: f32,

        /// Run on the wall clock instead of simulated time
        #[arg(long)]
        realtime: bool,
    },

    /// Classify a minimap capture and write calibration images
    Inspect {
        /// Minimap capture (PNG)
        image: PathBuf,

        /// Output directory for debug images
        #[arg(short, long, default_value = "./debug")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drishti_nav=info".parse().map_err(|e| {
                    NavError::Config(format!("invalid log directive: {e}"))
                })?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            NavConfig::load(path)?
        }
        None if Path::new("drishti.toml").exists() => {
            info!("Loading configuration from drishti.toml");
            NavConfig::load("drishti.toml")?
        }
        None => {
            info!("Using default configuration");
            NavConfig::default()
        }
    };

    info!("DrishtiNav v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Explore {
            terrain,
            width,
            height,
            seed,
            steps,
            speed,
            realtime,
        } => {
            let clock: Arc<dyn Clock> = if realtime {
                Arc::new(SystemClock)
            } else {
                Arc::new(ManualClock::new())
            };
            let sim = SimConfig {
                speed,
                ..SimConfig::default()
            };
            let world = match terrain {
                Some(path) => SimWorld::load(&path, &config.minimap, sim, clock.clone())?,
                None => SimWorld::arena(width, height, seed, &config.minimap, sim, clock.clone())?,
            };
            explore(&config, world, clock, steps)
        }
        Command::Inspect { image, output } => inspect(&config, &image, &output),
    }
}

fn explore(config: &NavConfig, world: SimWorld, clock: Arc<dyn Clock>, steps: usize) -> Result<()> {
    let start = clock.now();
    let mut camera = world.clone();
    let mut legs = world.clone();
    let interrupt = InterruptFlag::new();

    let mut controller = MovementController::from_config(config, clock.clone());
    let done = controller.explore_area(&mut camera, &mut legs, &interrupt, steps);

    let stats = controller.stats();
    let sim = world.stats();
    let end = world.position();

    info!("Completed {}/{} steps", done, steps);
    info!(
        "Retries: {}, stuck detections: {}, sectors visited: {}",
        stats.total_retries, stats.pathfinding.stuck_count, stats.pathfinding.visited_sectors
    );
    info!(
        "Walked {:.0}px in {:.1}s ({} captures, {} walls hit), ending at ({}, {})",
        sim.distance,
        clock.since(start).as_secs_f32(),
        sim.captures,
        sim.blocked,
        end.x,
        end.y
    );
    Ok(())
}

fn inspect(config: &NavConfig, capture: &Path, output: &Path) -> Result<()> {
    let raster = image::open(capture)?.into_rgb8();
    info!(
        "Minimap loaded: {}x{} from {}",
        raster.width(),
        raster.height(),
        capture.display()
    );

    let configured = config.minimap.player_center;
    let inside = (configured.x as u32) < raster.width() && (configured.y as u32) < raster.height();
    let center = if inside {
        configured
    } else {
        let fallback = PixelPoint::new(raster.width() as i32 / 2, raster.height() as i32 / 2);
        warn!(
            "Configured center ({}, {}) is outside the image, using ({}, {})",
            configured.x, configured.y, fallback.x, fallback.y
        );
        fallback
    };
    let map = LocalMap::new(raster, center)
        .ok_or_else(|| NavError::Image("minimap image is empty".into()))?;

    let mut classifier = TerrainClassifier::new(config.minimap.clone());
    let masks = classifier.masks(&map);
    let report = CoverageReport::from_masks(&masks);

    println!("{report}");
    for warning in report.warnings() {
        println!("Warning: {warning}");
    }

    println!("Safe directions: {:?}", classifier.safe_directions_in(&map));

    let mut rng = match config.pathfinding.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let candidates = classifier.candidates_in(&map, config.pathfinding.edge_distance, &mut rng);
    let stats = classifier.stats();
    println!(
        "Candidates: {} kept of {} accepted ({} too close, {} near obstacle, {} near hazard)",
        candidates.len(),
        stats.accepted,
        stats.rejected_too_close,
        stats.rejected_obstacle,
        stats.rejected_hazard
    );

    std::fs::create_dir_all(output)?;
    let center = map.center();
    render_overlay(&map, &masks, &candidates).save(output.join("overlay.png"))?;
    render_mask(&masks.walkable, center).save(output.join("mask_walkable.png"))?;
    render_mask(&masks.obstacle, center).save(output.join("mask_obstacle.png"))?;
    render_mask(&masks.hazard, center).save(output.join("mask_hazard.png"))?;
    info!("Debug images written to {}", output.display());
    Ok(())
}
