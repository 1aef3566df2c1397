//! Raster primitives: snapshots, color rules and binary masks.

mod color;
mod local_map;
mod mask;

pub use color::{ColorSignature, luminance, rgb_to_hsv};
pub use local_map::{LocalMap, PixelPoint, Region};
pub use mask::{Mask, PixelRect};
