mod codec;
mod ffmpeg;

pub use codec::OutputCodec;
pub use ffmpeg::FfmpegSink;

use crate::error::MediaResult;
use crate::segmentation::Frame;

/// Parameters a sink is opened with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkSettings {
    pub codec: OutputCodec,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
}

/// Trait for encoded video destinations
pub trait FrameSink {
    /// Append a frame. Frames are written in call order.
    fn write_frame(&mut self, frame: &Frame) -> MediaResult<()>;

    /// Finalize the container. Must run once at the end of every run,
    /// successful or not; further calls are no-ops.
    fn close(&mut self) -> MediaResult<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);
}
