use anyhow::Result;
use image::{GrayImage, ImageBuffer, Luma, RgbImage};

/// A decoded video frame: 8-bit RGB, row-major.
pub type Frame = RgbImage;

/// Foreground likelihood per pixel, 0.0 = background, 1.0 = foreground.
/// Dimensions match the frame it was computed from.
pub type ProbabilityMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Refined keep/drop mask. Zero marks background, anything else is kept.
pub type BinaryMask = GrayImage;

/// Trait for segmentation models
/// Allows swapping between different backends (selfie segmentation, test stubs, etc.)
///
/// Implementations must be stateless across frames: the same frame always
/// produces the same map for a fixed set of weights.
pub trait SegmentationModel {
    /// Process a frame and return a same-resolution probability map
    fn segment(&mut self, frame: &Frame) -> Result<ProbabilityMap>;

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}

impl<M: SegmentationModel + ?Sized> SegmentationModel for Box<M> {
    fn segment(&mut self, frame: &Frame) -> Result<ProbabilityMap> {
        (**self).segment(frame)
    }

    fn input_size(&self) -> (u32, u32) {
        (**self).input_size()
    }
}
