//! Angular sectors around the agent and the candidates that fall in them.

use std::f32::consts::TAU;
use std::fmt;

use serde::Serialize;

use crate::raster::{PixelPoint, Region};
use crate::utils::normalize_angle;

/// Number of angular sectors around the agent.
pub const SECTOR_COUNT: usize = 8;

/// One of [`SECTOR_COUNT`] equal angular slices around the agent.
///
/// Sector 0 starts at screen east and indices grow clockwise on screen
/// (toward +y, which points down).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Sector(u8);

impl Sector {
    pub const ALL: [Sector; SECTOR_COUNT] = [
        Sector(0),
        Sector(1),
        Sector(2),
        Sector(3),
        Sector(4),
        Sector(5),
        Sector(6),
        Sector(7),
    ];

    /// Sector with the given index, `None` if out of range.
    pub fn new(index: usize) -> Option<Self> {
        (index < SECTOR_COUNT).then_some(Sector(index as u8))
    }

    /// Sector of an offset relative to the agent.
    pub fn of(offset: PixelPoint) -> Self {
        let angle = normalize_angle((offset.y as f32).atan2(offset.x as f32));
        let index = (angle / (TAU / SECTOR_COUNT as f32)).floor() as usize;
        Sector((index % SECTOR_COUNT) as u8)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Sector pointing the other way.
    pub fn opposite(self) -> Self {
        self.offset(SECTOR_COUNT / 2)
    }

    /// The two sectors adjacent to this one.
    pub fn neighbors(self) -> [Sector; 2] {
        [self.offset(SECTOR_COUNT - 1), self.offset(1)]
    }

    fn offset(self, steps: usize) -> Self {
        Sector(((self.index() + steps) % SECTOR_COUNT) as u8)
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Walkable destination candidate, in minimap coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Candidate {
    /// Pixel inside the minimap
    pub point: PixelPoint,
    /// Offset from the agent pixel
    pub offset: PixelPoint,
    pub sector: Sector,
    /// Distance from the agent (pixels)
    pub distance: f32,
}

impl Candidate {
    pub fn new(point: PixelPoint, center: PixelPoint) -> Self {
        let offset = point - center;
        Self {
            point,
            offset,
            sector: Sector::of(offset),
            distance: point.distance(&center),
        }
    }

    /// Screen coordinates of the candidate.
    pub fn absolute(&self, region: Region) -> PixelPoint {
        region.to_screen(self.point)
    }
}
