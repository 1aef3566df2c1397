//! Binary occupancy masks over a raster.
//!
//! Masks store 255 for "present" and 0 for "absent", so they can be written
//! out as grayscale images for calibration.

use image::{GrayImage, Luma};

use super::local_map::PixelPoint;

const ON: Luma<u8> = Luma([255]);
const OFF: Luma<u8> = Luma([0]);

/// Inclusive-exclusive pixel rectangle `[x0, x1) × [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Square window of `radius` pixels around a point (inclusive).
    pub fn around(point: PixelPoint, radius: i32) -> Self {
        Self::new(
            point.x - radius,
            point.y - radius,
            point.x + radius + 1,
            point.y + radius + 1,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

/// Binary mask with the same dimensions as its source raster.
#[derive(Clone, Debug)]
pub struct Mask {
    pixels: GrayImage,
}

impl Mask {
    /// Create an empty mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            pixels: GrayImage::from_pixel(width, height, OFF),
        }
    }

    /// Build a mask from a per-pixel predicate.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        Self {
            pixels: GrayImage::from_fn(width, height, |x, y| if f(x, y) { ON } else { OFF }),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Membership test; points outside the mask are absent.
    #[inline]
    pub fn contains(&self, point: PixelPoint) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as u32) < self.pixels.width()
            && (point.y as u32) < self.pixels.height()
            && self.pixels.get_pixel(point.x as u32, point.y as u32).0[0] > 0
    }

    pub fn set(&mut self, point: PixelPoint, present: bool) {
        if point.x >= 0
            && point.y >= 0
            && (point.x as u32) < self.pixels.width()
            && (point.y as u32) < self.pixels.height()
        {
            self.pixels
                .put_pixel(point.x as u32, point.y as u32, if present { ON } else { OFF });
        }
    }

    /// Clip a rectangle to the mask bounds.
    fn clip(&self, rect: PixelRect) -> PixelRect {
        PixelRect::new(
            rect.x0.max(0),
            rect.y0.max(0),
            rect.x1.min(self.pixels.width() as i32),
            rect.y1.min(self.pixels.height() as i32),
        )
    }

    /// True if any present pixel lies inside the (clipped) rectangle.
    pub fn any_in(&self, rect: PixelRect) -> bool {
        let rect = self.clip(rect);
        if rect.is_empty() {
            return false;
        }
        (rect.y0..rect.y1).any(|y| {
            (rect.x0..rect.x1).any(|x| self.pixels.get_pixel(x as u32, y as u32).0[0] > 0)
        })
    }

    /// Number of present pixels.
    pub fn count(&self) -> usize {
        self.pixels.pixels().filter(|p| p.0[0] > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.pixels.pixels().any(|p| p.0[0] > 0)
    }

    /// Iterate over present pixels in row-major order.
    pub fn points(&self) -> impl Iterator<Item = PixelPoint> + '_ {
        self.pixels
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .map(|(x, y, _)| PixelPoint::new(x as i32, y as i32))
    }

    /// One pass of 3×3 morphological erosion.
    ///
    /// A pixel survives only if its whole 8-neighbourhood is present.
    /// Neighbours outside the raster do not erode (the frame edge is not a
    /// terrain boundary).
    pub fn eroded(&self) -> Mask {
        let width = self.pixels.width();
        let height = self.pixels.height();
        Mask::from_fn(width, height, |x, y| {
            let center = PixelPoint::new(x as i32, y as i32);
            if !self.contains(center) {
                return false;
            }
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let n = PixelPoint::new(center.x + dx, center.y + dy);
                    let inside = n.x >= 0 && n.y >= 0 && n.x < width as i32 && n.y < height as i32;
                    if inside && !self.contains(n) {
                        return false;
                    }
                }
            }
            true
        })
    }

    /// Borrow the underlying grayscale image.
    pub fn as_image(&self) -> &GrayImage {
        &self.pixels
    }
}
