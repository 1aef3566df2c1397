//! Color recognition rules for terrain classes.

use serde::{Deserialize, Serialize};

/// Recognition rule for one terrain class.
///
/// Reference colors are compared per channel with a symmetric tolerance.
/// The HSV range form is kept for older calibration files; it uses the
/// 8-bit HSV convention (hue in `0..180`, saturation and value in `0..=255`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSignature {
    /// Exact RGB reference colors.
    Reference { rgb_colors: Vec<[u8; 3]> },
    /// Inclusive HSV bounds.
    HsvRange {
        hsv_lower: [u8; 3],
        hsv_upper: [u8; 3],
    },
}

impl ColorSignature {
    pub fn reference(colors: &[[u8; 3]]) -> Self {
        Self::Reference {
            rgb_colors: colors.to_vec(),
        }
    }

    pub fn hsv_range(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self::HsvRange {
            hsv_lower: lower,
            hsv_upper: upper,
        }
    }

    /// Test whether a pixel belongs to this signature.
    ///
    /// `tolerance` only applies to reference colors.
    #[inline]
    pub fn matches(&self, pixel: [u8; 3], tolerance: u8) -> bool {
        match self {
            Self::Reference { rgb_colors } => rgb_colors
                .iter()
                .any(|reference| within_tolerance(pixel, *reference, tolerance)),
            Self::HsvRange {
                hsv_lower,
                hsv_upper,
            } => {
                let hsv = rgb_to_hsv(pixel);
                (0..3).all(|i| hsv[i] >= hsv_lower[i] && hsv[i] <= hsv_upper[i])
            }
        }
    }

    /// Whether the signature can ever match anything.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Reference { rgb_colors } => rgb_colors.is_empty(),
            Self::HsvRange {
                hsv_lower,
                hsv_upper,
            } => (0..3).any(|i| hsv_lower[i] > hsv_upper[i]),
        }
    }
}

#[inline]
fn within_tolerance(pixel: [u8; 3], reference: [u8; 3], tolerance: u8) -> bool {
    pixel
        .iter()
        .zip(reference.iter())
        .all(|(&p, &r)| p.abs_diff(r) <= tolerance)
}

/// Convert RGB to 8-bit HSV (hue halved to fit `0..180`).
pub fn rgb_to_hsv(pixel: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = pixel.map(|c| c as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    // 360° wraps to 0 after halving and rounding
    let h8 = ((h / 2.0).round() as u16 % 180) as u8;
    [h8, s.round() as u8, v as u8]
}

/// Luminance of an RGB pixel (ITU-R BT.601 weights).
#[inline]
pub fn luminance(pixel: [u8; 3]) -> u8 {
    let [r, g, b] = pixel.map(|c| c as f32);
    (0.299 * r + 0.587 * g + 0.114 * b).round().min(255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_tolerance_is_symmetric() {
        let sig = ColorSignature::reference(&[[100, 150, 200]]);
        assert!(sig.matches([103, 147, 200], 3));
        assert!(sig.matches([97, 153, 203], 3));
        assert!(!sig.matches([104, 150, 200], 3));
        assert!(!sig.matches([100, 150, 196], 3));
    }

    #[test]
    fn test_reference_saturates_at_bounds() {
        let sig = ColorSignature::reference(&[[0, 255, 0]]);
        assert!(sig.matches([2, 253, 1], 3));
    }

    #[test]
    fn test_any_reference_color_matches() {
        let sig = ColorSignature::reference(&[[0, 0, 0], [51, 51, 51]]);
        assert!(sig.matches([50, 52, 51], 2));
        assert!(sig.matches([1, 0, 0], 2));
        assert!(!sig.matches([25, 25, 25], 2));
    }

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([255, 255, 0]), [30, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
        assert_eq!(rgb_to_hsv([128, 128, 128]), [0, 0, 128]);
    }

    #[test]
    fn test_hsv_range_signature() {
        // Yellow-ish hues only
        let sig = ColorSignature::hsv_range([25, 100, 100], [35, 255, 255]);
        assert!(sig.matches([255, 255, 0], 0));
        assert!(!sig.matches([255, 0, 0], 0));
        assert!(!sig.matches([60, 60, 20], 0));
    }

    #[test]
    fn test_empty_signature() {
        assert!(ColorSignature::reference(&[]).is_empty());
        assert!(ColorSignature::hsv_range([10, 0, 0], [5, 255, 255]).is_empty());
        assert!(!ColorSignature::reference(&[[1, 2, 3]]).is_empty());
    }

    #[test]
    fn test_luminance() {
        assert_eq!(luminance([0, 0, 0]), 0);
        assert_eq!(luminance([255, 255, 255]), 255);
        assert_eq!(luminance([100, 0, 0]), 30);
    }

    #[test]
    fn test_signature_from_toml() {
        #[derive(Deserialize)]
        struct Table {
            walkable: ColorSignature,
            hazard: ColorSignature,
        }

        let table: Table = toml::from_str(
            r#"
            walkable = { rgb_colors = [[255, 102, 0], [204, 102, 0]] }
            hazard = { hsv_lower = [25, 100, 100], hsv_upper = [35, 255, 255] }
            "#,
        )
        .unwrap();

        assert_eq!(
            table.walkable,
            ColorSignature::reference(&[[255, 102, 0], [204, 102, 0]])
        );
        assert!(matches!(table.hazard, ColorSignature::HsvRange { .. }));
    }
}
