//! Video background removal.
//!
//! Each frame is segmented into a foreground probability map, refined into
//! a keep/drop mask, and composited against a flat background color before
//! being re-encoded. Audio is dropped.

pub mod composite;
pub mod config;
pub mod error;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod refine;
pub mod segmentation;
pub mod source;

pub use composite::{composite, BackgroundColor};
pub use config::{PipelineConfig, DEFAULT_OUTPUT};
pub use error::{ErrorKind, MediaError, PipelineError};
pub use media::{FfmpegBackend, MediaBackend};
pub use pipeline::{PipelineDriver, PipelineEvent, PipelineState, PipelineWorker};
pub use refine::MaskRefiner;
