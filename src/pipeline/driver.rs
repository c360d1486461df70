use super::progress::{ProgressObserver, ProgressState};
use crate::composite::composite;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::media::MediaBackend;
use crate::output::{FrameSink, SinkSettings};
use crate::refine::MaskRefiner;
use crate::segmentation::SegmentationModel;
use crate::source::FrameSource;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where a driver is in its single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub frames: u64,
}

pub type PipelineResult = Result<RunSummary, PipelineError>;

/// Shared flag asking a run to stop before its next frame
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Average time per stage, logged periodically
#[derive(Debug, Default)]
struct StageTimings {
    decode: Duration,
    segment: Duration,
    refine: Duration,
    encode: Duration,
}

impl StageTimings {
    const LOG_EVERY: u64 = 30;

    fn log(&self, frames: u64) {
        let avg = |d: Duration| d.as_secs_f64() * 1000.0 / frames as f64;
        let total_ms =
            avg(self.decode) + avg(self.segment) + avg(self.refine) + avg(self.encode);
        tracing::info!(
            "Frame {}: decode={:.1}ms, segment={:.1}ms, refine={:.1}ms, encode={:.1}ms, total={:.1}ms, fps={:.1}",
            frames,
            avg(self.decode),
            avg(self.segment),
            avg(self.refine),
            avg(self.encode),
            total_ms,
            1000.0 / total_ms
        );
    }
}

/// Runs one source → segment → refine → composite → sink pass
///
/// A driver performs exactly one run. Frames are handled one at a time,
/// in decode order, on the calling thread.
pub struct PipelineDriver<B: MediaBackend, M: SegmentationModel> {
    backend: B,
    model: M,
    refiner: MaskRefiner,
    config: PipelineConfig,
    state: PipelineState,
    progress: ProgressState,
    cancel: CancelFlag,
}

impl<B: MediaBackend, M: SegmentationModel> PipelineDriver<B, M> {
    pub fn new(backend: B, model: M, config: PipelineConfig) -> Self {
        Self {
            backend,
            model,
            refiner: MaskRefiner::new(),
            config,
            state: PipelineState::Idle,
            progress: ProgressState::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn progress(&self) -> ProgressState {
        self.progress
    }

    /// Process `source_path` into `sink_path`
    ///
    /// Reports progress and exactly one terminal event to `observer`. A
    /// failed run keeps whatever frames were already written.
    pub fn start(
        &mut self,
        source_path: &Path,
        sink_path: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> PipelineResult {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::Configuration(format!(
                "driver is {:?}; a new run needs a new driver",
                self.state
            )));
        }

        let result = validate_paths(source_path, sink_path).and_then(|()| {
            self.state = PipelineState::Running;
            tracing::info!("Starting video processing: {}", source_path.display());
            self.execute(source_path, sink_path, observer)
        });

        match &result {
            Ok(summary) => {
                self.state = PipelineState::Completed;
                tracing::info!("Video processing finished ({} frames)", summary.frames);
                observer.on_finished(
                    true,
                    &format!("Video saved without audio to {}", summary.output.display()),
                );
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                tracing::error!("Video processing failed: {}", e);
                observer.on_finished(false, &e.to_string());
            }
        }

        result
    }

    fn execute(
        &mut self,
        source_path: &Path,
        sink_path: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> PipelineResult {
        let mut source = self.backend.open_source(source_path)?;

        let (width, height) = source.resolution();
        let settings = SinkSettings {
            codec: self.config.codec,
            frame_rate: source.frame_rate(),
            width,
            height,
        };
        let mut sink = match self.backend.open_sink(sink_path, settings) {
            Ok(sink) => sink,
            Err(e) => {
                if let Err(close_err) = source.close() {
                    tracing::warn!("Failed to close source: {}", close_err);
                }
                return Err(e.into());
            }
        };

        self.progress = ProgressState::new(source.frame_count());
        let outcome = self.process_frames(&mut source, &mut sink, observer);

        let source_closed = source.close();
        let sink_closed = sink.close();

        match outcome {
            Ok(()) => {
                if let Err(e) = source_closed {
                    tracing::warn!("Failed to close source: {}", e);
                }
                sink_closed?;
                Ok(RunSummary {
                    output: sink_path.to_path_buf(),
                    frames: self.progress.current(),
                })
            }
            Err(e) => {
                if let Err(close_err) = source_closed {
                    tracing::warn!("Failed to close source: {}", close_err);
                }
                if let Err(close_err) = sink_closed {
                    tracing::warn!("Failed to finalize partial output: {}", close_err);
                }
                Err(e)
            }
        }
    }

    fn process_frames(
        &mut self,
        source: &mut B::Source,
        sink: &mut B::Sink,
        observer: &mut dyn ProgressObserver,
    ) -> Result<(), PipelineError> {
        let mut timings = StageTimings::default();

        loop {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    frames: self.progress.current(),
                });
            }

            let started = Instant::now();
            let Some(frame) = source.next_frame()? else {
                break;
            };
            timings.decode += started.elapsed();

            let index = self.progress.current() + 1;
            let _span = tracing::debug_span!("frame", index).entered();

            let started = Instant::now();
            let map = self
                .model
                .segment(&frame)
                .map_err(|e| PipelineError::model(index, e))?;
            timings.segment += started.elapsed();

            if map.dimensions() != frame.dimensions() {
                return Err(PipelineError::Model {
                    frame: index,
                    message: format!(
                        "probability map is {:?} but the frame is {:?}",
                        map.dimensions(),
                        frame.dimensions()
                    ),
                });
            }

            let started = Instant::now();
            let mask = self.refiner.refine(&map);
            let output = composite(&frame, &mask, self.config.background).ok_or_else(|| {
                PipelineError::Model {
                    frame: index,
                    message: "refined mask does not match the frame".to_string(),
                }
            })?;
            timings.refine += started.elapsed();

            let started = Instant::now();
            sink.write_frame(&output)?;
            timings.encode += started.elapsed();

            let progress = self.progress.advance();
            observer.on_progress(progress.current(), progress.total());
            tracing::debug!(
                "Processing frame {} of {}",
                progress.current(),
                progress.total()
            );

            if progress.current() % StageTimings::LOG_EVERY == 0 {
                timings.log(progress.current());
            }
        }

        Ok(())
    }
}

/// Reject runs that cannot start, before any resource is opened
fn validate_paths(source: &Path, sink: &Path) -> Result<(), PipelineError> {
    if source.as_os_str().is_empty() {
        return Err(PipelineError::Configuration(
            "no input video selected".to_string(),
        ));
    }
    if sink.as_os_str().is_empty() {
        return Err(PipelineError::Configuration(
            "no output path given".to_string(),
        ));
    }
    if source.is_dir() {
        return Err(PipelineError::Configuration(format!(
            "input {} is a directory",
            source.display()
        )));
    }
    let same = source == sink
        || matches!(
            (source.canonicalize(), sink.canonicalize()),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(PipelineError::Configuration(
            "output path would overwrite the input".to_string(),
        ));
    }
    Ok(())
}
