//! Calibration helpers: terrain coverage report and overlay rendering.

use std::fmt;

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::pathfinding::Candidate;
use crate::raster::{LocalMap, Mask, PixelPoint};
use crate::terrain::TerrainMasks;

const WALKABLE_OVERLAY: Rgb<u8> = Rgb([255, 165, 0]);
const OBSTACLE_OVERLAY: Rgb<u8> = Rgb([50, 50, 50]);
const HAZARD_OVERLAY: Rgb<u8> = Rgb([255, 255, 0]);
const CENTER_MARK: Rgb<u8> = Rgb([0, 255, 0]);
const CANDIDATE_MARK: Rgb<u8> = Rgb([255, 0, 0]);

/// Obstacle-to-walkable ratio below which the obstacle colors are suspect.
const SPARSE_OBSTACLE_RATIO: f32 = 0.1;

/// Problems visible in a coverage report.
#[derive(Clone, Debug, PartialEq)]
pub enum CalibrationWarning {
    /// No pixel matched the walkable rule
    NoWalkable,
    /// No pixel matched the obstacle rule; walls are invisible
    NoObstacle,
    /// Very few obstacle pixels compared to walkable ones
    SparseObstacles { obstacle: usize, walkable: usize },
}

impl fmt::Display for CalibrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationWarning::NoWalkable => {
                write!(f, "no walkable pixels detected, walkable colors are probably wrong")
            }
            CalibrationWarning::NoObstacle => {
                write!(f, "no obstacle pixels detected, walls will not be avoided")
            }
            CalibrationWarning::SparseObstacles { obstacle, walkable } => write!(
                f,
                "very few obstacle pixels ({} vs {} walkable), obstacle colors may be wrong",
                obstacle, walkable
            ),
        }
    }
}

/// Pixel counts per terrain class for one snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverageReport {
    pub total: usize,
    pub walkable: usize,
    pub obstacle: usize,
    pub hazard: usize,
    /// Pixels matched by no rule
    pub unclassified: usize,
}

impl CoverageReport {
    pub fn from_masks(masks: &TerrainMasks) -> Self {
        let width = masks.walkable.width();
        let height = masks.walkable.height();
        let total = (width * height) as usize;

        let detected = (0..height)
            .flat_map(|y| (0..width).map(move |x| PixelPoint::new(x as i32, y as i32)))
            .filter(|&p| {
                masks.walkable.contains(p) || masks.obstacle.contains(p) || masks.hazard.contains(p)
            })
            .count();

        Self {
            total,
            walkable: masks.walkable.count(),
            obstacle: masks.obstacle.count(),
            hazard: masks.hazard.count(),
            unclassified: total - detected,
        }
    }

    /// Share of the snapshot in percent.
    pub fn percent(&self, count: usize) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            count as f32 / self.total as f32 * 100.0
        }
    }

    pub fn warnings(&self) -> Vec<CalibrationWarning> {
        let mut warnings = Vec::new();
        if self.walkable == 0 {
            warnings.push(CalibrationWarning::NoWalkable);
        }
        if self.obstacle == 0 {
            warnings.push(CalibrationWarning::NoObstacle);
        } else if (self.obstacle as f32) < self.walkable as f32 * SPARSE_OBSTACLE_RATIO {
            warnings.push(CalibrationWarning::SparseObstacles {
                obstacle: self.obstacle,
                walkable: self.walkable,
            });
        }
        warnings
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total pixels:  {}", self.total)?;
        writeln!(f, "Walkable:      {} ({:.1}%)", self.walkable, self.percent(self.walkable))?;
        writeln!(f, "Obstacle:      {} ({:.1}%)", self.obstacle, self.percent(self.obstacle))?;
        writeln!(f, "Hazard:        {} ({:.1}%)", self.hazard, self.percent(self.hazard))?;
        write!(
            f,
            "Unclassified:  {} ({:.1}%)",
            self.unclassified,
            self.percent(self.unclassified)
        )
    }
}

fn fill_disc(image: &mut RgbImage, center: PixelPoint, radius: i32, color: Rgb<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (center.x + dx, center.y + dy);
            if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Combined class map: walkable orange, obstacles dark gray, hazards
/// yellow, unclassified black. The agent is a green dot, candidates are red.
pub fn render_overlay(map: &LocalMap, masks: &TerrainMasks, candidates: &[Candidate]) -> RgbImage {
    let mut out = RgbImage::new(map.width(), map.height());

    for (mask, color) in [
        (&masks.walkable, WALKABLE_OVERLAY),
        (&masks.obstacle, OBSTACLE_OVERLAY),
        (&masks.hazard, HAZARD_OVERLAY),
    ] {
        for p in mask.points() {
            out.put_pixel(p.x as u32, p.y as u32, color);
        }
    }

    for candidate in candidates {
        fill_disc(&mut out, candidate.point, 1, CANDIDATE_MARK);
    }
    fill_disc(&mut out, map.center(), 3, CENTER_MARK);
    out
}

/// A single class mask (white = matched) with the agent marked.
pub fn render_mask(mask: &Mask, center: PixelPoint) -> GrayImage {
    let mut out = mask.as_image().clone();
    for dy in -1..=1 {
        for dx in -1..=1 {
            let (x, y) = (center.x + dx, center.y + dy);
            if x >= 0 && y >= 0 && (x as u32) < out.width() && (y as u32) < out.height() {
                out.put_pixel(x as u32, y as u32, Luma([128]));
            }
        }
    }
    out
}
