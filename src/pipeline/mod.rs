mod driver;
mod progress;
mod worker;

pub use driver::{CancelFlag, PipelineDriver, PipelineResult, PipelineState, RunSummary};
pub use progress::{PipelineEvent, ProgressObserver, ProgressState};
pub use worker::{PipelineWorker, WorkerError};
