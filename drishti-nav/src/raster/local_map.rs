//! Agent-centred raster snapshots.
//!
//! A [`LocalMap`] is one capture of the minimap region. The agent marker is
//! always drawn at the same pixel (`center`); the terrain scrolls beneath it
//! when the agent walks.

use std::ops::Sub;

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate (x grows right, y grows down).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &PixelPoint) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Dot product treating both points as vectors.
    #[inline]
    pub fn dot(&self, other: &PixelPoint) -> i64 {
        self.x as i64 * other.x as i64 + self.y as i64 * other.y as i64
    }
}

impl Sub for PixelPoint {
    type Output = PixelPoint;

    fn sub(self, rhs: PixelPoint) -> PixelPoint {
        PixelPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Screen rectangle captured as the minimap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check if a region-relative point lies inside the region.
    pub fn contains(&self, point: PixelPoint) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as u32) < self.width
            && (point.y as u32) < self.height
    }

    /// Convert a region-relative point to absolute screen coordinates.
    pub fn to_screen(&self, point: PixelPoint) -> PixelPoint {
        PixelPoint::new(self.x + point.x, self.y + point.y)
    }
}

/// One captured minimap frame with the agent's fixed pixel.
#[derive(Clone, Debug)]
pub struct LocalMap {
    image: RgbImage,
    center: PixelPoint,
}

impl LocalMap {
    /// Wrap a captured image.
    ///
    /// Returns `None` when `center` lies outside the image, since such a frame
    /// cannot be interpreted relative to the agent.
    pub fn new(image: RgbImage, center: PixelPoint) -> Option<Self> {
        let inside = center.x >= 0
            && center.y >= 0
            && (center.x as u32) < image.width()
            && (center.y as u32) < image.height();
        inside.then_some(Self { image, center })
    }

    /// Build a map of uniform color (mostly useful for tests and simulation).
    pub fn filled(width: u32, height: u32, center: PixelPoint, color: [u8; 3]) -> Option<Self> {
        Self::new(RgbImage::from_pixel(width, height, Rgb(color)), center)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn center(&self) -> PixelPoint {
        self.center
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Check whether a point lies inside the frame.
    #[inline]
    pub fn contains(&self, point: PixelPoint) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as u32) < self.image.width()
            && (point.y as u32) < self.image.height()
    }

    /// Pixel color at a point, `None` outside the frame.
    #[inline]
    pub fn pixel(&self, point: PixelPoint) -> Option<[u8; 3]> {
        self.contains(point)
            .then(|| self.image.get_pixel(point.x as u32, point.y as u32).0)
    }

    /// Overwrite a pixel. Points outside the frame are ignored.
    pub fn set_pixel(&mut self, point: PixelPoint, color: [u8; 3]) {
        if self.contains(point) {
            self.image.put_pixel(point.x as u32, point.y as u32, Rgb(color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_must_be_inside() {
        assert!(LocalMap::filled(10, 10, PixelPoint::new(5, 5), [0, 0, 0]).is_some());
        assert!(LocalMap::filled(10, 10, PixelPoint::new(10, 5), [0, 0, 0]).is_none());
        assert!(LocalMap::filled(10, 10, PixelPoint::new(-1, 5), [0, 0, 0]).is_none());
    }

    #[test]
    fn test_pixel_access() {
        let mut map = LocalMap::filled(8, 8, PixelPoint::new(4, 4), [1, 2, 3]).unwrap();
        map.set_pixel(PixelPoint::new(2, 3), [9, 9, 9]);
        map.set_pixel(PixelPoint::new(20, 3), [9, 9, 9]);

        assert_eq!(map.pixel(PixelPoint::new(2, 3)), Some([9, 9, 9]));
        assert_eq!(map.pixel(PixelPoint::new(0, 0)), Some([1, 2, 3]));
        assert_eq!(map.pixel(PixelPoint::new(8, 0)), None);
    }

    #[test]
    fn test_region_to_screen() {
        let region = Region::new(1200, 40, 106, 109);
        assert_eq!(
            region.to_screen(PixelPoint::new(53, 54)),
            PixelPoint::new(1253, 94)
        );
        assert!(region.contains(PixelPoint::new(105, 108)));
        assert!(!region.contains(PixelPoint::new(106, 0)));
    }

    #[test]
    fn test_point_math() {
        let a = PixelPoint::new(3, 4);
        assert_eq!(a.distance(&PixelPoint::new(0, 0)), 5.0);
        assert_eq!(a - PixelPoint::new(1, 1), PixelPoint::new(2, 3));
        assert_eq!(a.dot(&PixelPoint::new(-3, -4)), -25);
    }
}
