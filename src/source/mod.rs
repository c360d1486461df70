mod ffmpeg;
pub mod probe;

pub use ffmpeg::FfmpegSource;
pub use probe::{VideoInfo, FALLBACK_FPS};

use crate::error::MediaResult;
use crate::segmentation::Frame;

/// Trait for decoded video sources
pub trait FrameSource {
    /// Frames per second; never zero
    fn frame_rate(&self) -> f64;

    /// Container-reported frame count. Only a progress hint: it may be
    /// wrong or 0, so never use it to decide when to stop reading.
    fn frame_count(&self) -> u64;

    /// Get the resolution of decoded frames
    fn resolution(&self) -> (u32, u32);

    /// Read the next frame in decode order, `None` at end of stream
    fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Release decode resources. Safe after end of stream and on error paths.
    fn close(&mut self) -> MediaResult<()>;
}
