use std::path::PathBuf;
use thiserror::Error;

/// Result type for decode/encode plumbing.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised by frame sources and sinks.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Output directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("FFprobe failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Decoder returned a truncated frame ({got} of {expected} bytes)")]
    TruncatedFrame { got: usize, expected: usize },

    #[error("Frame is {got:?}, sink was opened for {expected:?}")]
    FrameSizeMismatch {
        got: (u32, u32),
        expected: (u32, u32),
    },

    #[error("FFmpeg {stage} failed: {message}")]
    FfmpegFailed {
        stage: &'static str,
        message: String,
        stderr: Option<String>,
    },

    #[error("Handle already closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(
        stage: &'static str,
        message: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::FfmpegFailed {
            stage,
            message: message.into(),
            stderr: stderr.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Model,
    Configuration,
    Cancelled,
}

/// Terminal failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] MediaError),

    #[error("Segmentation failed on frame {frame}: {message}")]
    Model { frame: u64, message: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Run cancelled after {frames} frames")]
    Cancelled { frames: u64 },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Model { .. } => ErrorKind::Model,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn model(frame: u64, err: anyhow::Error) -> Self {
        Self::Model {
            frame,
            message: format!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let io = PipelineError::from(MediaError::FileNotFound(PathBuf::from("a.mp4")));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(io.to_string(), "File not found: a.mp4");

        let model = PipelineError::model(3, anyhow::anyhow!("bad tensor").context("inference"));
        assert_eq!(model.kind(), ErrorKind::Model);
        assert_eq!(
            model.to_string(),
            "Segmentation failed on frame 3: inference: bad tensor"
        );

        assert_eq!(
            PipelineError::Configuration("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            PipelineError::Cancelled { frames: 2 }.kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn test_blank_stderr_is_dropped() {
        match MediaError::ffmpeg_failed("encode", "exit 1", Some("  \n".into())) {
            MediaError::FfmpegFailed { stderr, .. } => assert!(stderr.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
