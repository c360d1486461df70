//! Pairing of frame sources and sinks used by the pipeline.

use crate::error::MediaResult;
use crate::output::{FfmpegSink, FrameSink, SinkSettings};
use crate::source::{FfmpegSource, FrameSource};
use std::io::Read;
use std::path::Path;
use std::process::ChildStderr;
use std::thread::JoinHandle;

/// Opens the source and sink for one run
pub trait MediaBackend {
    type Source: FrameSource;
    type Sink: FrameSink;

    fn open_source(&self, path: &Path) -> MediaResult<Self::Source>;

    fn open_sink(&self, path: &Path, settings: SinkSettings) -> MediaResult<Self::Sink>;
}

/// Decode and encode with the `ffmpeg` binaries on PATH
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    type Source = FfmpegSource;
    type Sink = FfmpegSink;

    fn open_source(&self, path: &Path) -> MediaResult<FfmpegSource> {
        FfmpegSource::open(path)
    }

    fn open_sink(&self, path: &Path, settings: SinkSettings) -> MediaResult<FfmpegSink> {
        FfmpegSink::open(path, settings)
    }
}

/// Drains a child's stderr on a helper thread so a chatty process can
/// never block on a full pipe.
pub(crate) struct StderrDrain(Option<JoinHandle<String>>);

impl StderrDrain {
    pub(crate) fn spawn(stderr: Option<ChildStderr>) -> Self {
        Self(stderr.map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        }))
    }

    /// Join the helper and return what the child printed, once
    pub(crate) fn collect(&mut self) -> Option<String> {
        self.0.take().and_then(|handle| handle.join().ok())
    }
}
