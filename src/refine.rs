//! Probability map → keep/drop mask.
//!
//! Threshold, smooth, then morphologically close. All parameters are fixed.

use crate::segmentation::{BinaryMask, ProbabilityMap};
use image::{ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};

/// A pixel is foreground when its probability is strictly above this.
pub const THRESHOLD: f32 = 0.5;

/// Side of the square Gaussian kernel.
pub const BLUR_KERNEL_SIZE: usize = 21;

/// Radius of the square structuring element (5x5).
pub const MORPH_RADIUS: u8 = 2;

/// Dilate and erode passes in the closing step.
pub const MORPH_ITERATIONS: usize = 2;

/// Binarize a probability map to {0, 255}
pub fn threshold(map: &ProbabilityMap) -> BinaryMask {
    let (width, height) = map.dimensions();
    BinaryMask::from_fn(width, height, |x, y| {
        if map.get_pixel(x, y)[0] > THRESHOLD {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Blur a {0, 255} mask at full precision, rounding once at the end
fn blur(mask: &BinaryMask, kernel: &[f32]) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let levels: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([f32::from(mask.get_pixel(x, y)[0])]));
    let blurred = separable_filter_equal(&levels, kernel);
    BinaryMask::from_fn(width, height, |x, y| {
        Luma([blurred.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// Normalized 1-D Gaussian taps. Sigma follows the usual rule for a
/// kernel given only by size: `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size as f32 - 1.0) / 2.0;
    let taps: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Turns per-frame probability maps into masks with stable, hole-free shapes
pub struct MaskRefiner {
    kernel: Vec<f32>,
    element: Mask,
}

impl MaskRefiner {
    pub fn new() -> Self {
        Self {
            kernel: gaussian_kernel(BLUR_KERNEL_SIZE),
            element: Mask::square(MORPH_RADIUS),
        }
    }

    /// Threshold, blur and close `map`. The result has the same dimensions.
    pub fn refine(&self, map: &ProbabilityMap) -> BinaryMask {
        let _span = tracing::debug_span!("refine").entered();

        let mut mask = threshold(map);
        if mask.width() == 0 || mask.height() == 0 {
            return mask;
        }

        mask = blur(&mask, &self.kernel);

        for _ in 0..MORPH_ITERATIONS {
            mask = grayscale_dilate(&mask, &self.element);
        }
        for _ in 0..MORPH_ITERATIONS {
            mask = grayscale_erode(&mask, &self.element);
        }

        mask
    }
}

impl Default for MaskRefiner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map_from_fn(w: u32, h: u32, f: impl Fn(u32, u32) -> f32) -> ProbabilityMap {
        ProbabilityMap::from_fn(w, h, |x, y| Luma([f(x, y)]))
    }

    #[test]
    fn test_threshold_is_strict() {
        let map = map_from_fn(3, 1, |x, _| [0.5, 0.50001, 0.2][x as usize]);
        let mask = threshold(&map);
        assert_eq!(mask.as_raw(), &vec![0, 255, 0]);
    }

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(BLUR_KERNEL_SIZE);
        assert_eq!(kernel.len(), 21);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(kernel[0], kernel[20]);
        assert!(kernel[10] > kernel[9]);
    }

    #[test]
    fn test_all_foreground_stays_nonzero() {
        let mask = MaskRefiner::new().refine(&map_from_fn(40, 30, |_, _| 1.0));
        assert!(mask.pixels().all(|p| p[0] > 0));
    }

    #[test]
    fn test_all_background_stays_zero() {
        let mask = MaskRefiner::new().refine(&map_from_fn(40, 30, |_, _| 0.0));
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_closing_fills_small_holes() {
        let map = map_from_fn(60, 60, |x, y| {
            if (29..=31).contains(&x) && (29..=31).contains(&y) {
                0.0
            } else {
                1.0
            }
        });
        let mask = MaskRefiner::new().refine(&map);
        assert!(mask.get_pixel(30, 30)[0] > 0);
    }

    #[test]
    fn test_half_split_keeps_left_and_drops_far_right() {
        let map = map_from_fn(80, 20, |x, _| if x < 40 { 1.0 } else { 0.0 });
        let mask = MaskRefiner::new().refine(&map);
        for y in 0..20 {
            for x in 0..40 {
                assert!(mask.get_pixel(x, y)[0] > 0, "({x},{y}) dropped");
            }
            for x in 55..80 {
                assert_eq!(mask.get_pixel(x, y)[0], 0, "({x},{y}) kept");
            }
        }
    }

    #[test]
    fn test_single_pixel_grows_to_rounded_square() {
        let map = map_from_fn(41, 41, |x, y| if (x, y) == (20, 20) { 1.0 } else { 0.0 });
        let mask = MaskRefiner::new().refine(&map);

        let widths: Vec<usize> = (0..41)
            .map(|y| (0..41).filter(|&x| mask.get_pixel(x, y)[0] > 0).count())
            .filter(|&n| n > 0)
            .collect();
        assert_eq!(widths, vec![7, 9, 11, 13, 13, 13, 13, 13, 13, 13, 11, 9, 7]);
        assert_eq!(widths.iter().sum::<usize>(), 145);
        assert!(mask.get_pixel(20, 14)[0] > 0);
        assert_eq!(mask.get_pixel(20, 13)[0], 0);
    }

    #[test]
    fn test_blur_rounds_once() {
        let kernel = gaussian_kernel(BLUR_KERNEL_SIZE);
        let mask = BinaryMask::from_fn(41, 41, |x, y| Luma([if (x, y) == (20, 20) { 255 } else { 0 }]));
        let blurred = blur(&mask, &kernel);
        for dx in 0..=10u32 {
            let expected = (255.0 * kernel[10 + dx as usize] * kernel[10]).round() as u8;
            assert_eq!(blurred.get_pixel(20 + dx, 20)[0], expected, "offset {dx}");
        }
        // 255 * k[16] * k[10] is about 0.77; flooring each pass would give 0
        assert_eq!(blurred.get_pixel(26, 20)[0], 1);
    }

    #[test]
    fn test_empty_map() {
        let mask = MaskRefiner::new().refine(&ProbabilityMap::new(0, 0));
        assert_eq!(mask.dimensions(), (0, 0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_refine_preserves_dimensions(w in 1u32..48, h in 1u32..48, seed in any::<u32>()) {
            let map = map_from_fn(w, h, |x, y| {
                ((x.wrapping_mul(31) ^ y.wrapping_mul(17) ^ seed) % 100) as f32 / 100.0
            });
            let mask = MaskRefiner::new().refine(&map);
            prop_assert_eq!(mask.dimensions(), (w, h));
        }
    }
}
