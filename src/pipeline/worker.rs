//! Background execution of pipeline runs.
//!
//! One worker thread, one run at a time. Callers submit a run and read
//! [`PipelineEvent`]s from a channel instead of sharing state with the
//! worker thread.

use super::driver::{CancelFlag, PipelineDriver};
use super::progress::{PipelineEvent, ProgressObserver};
use crate::config::PipelineConfig;
use crate::media::MediaBackend;
use crate::segmentation::SegmentationModel;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("A run is already in progress")]
    Busy,

    #[error("Worker thread has stopped")]
    Stopped,
}

struct Job {
    source: PathBuf,
    sink: PathBuf,
    cancel: CancelFlag,
}

/// Forwards events and frees the slot before the terminal event goes out,
/// so a caller reacting to `Finished` can submit again immediately.
struct SlotObserver<'a> {
    events: &'a Sender<PipelineEvent>,
    busy: &'a AtomicBool,
}

impl ProgressObserver for SlotObserver<'_> {
    fn on_progress(&mut self, current: u64, total: u64) {
        let _ = self.events.send(PipelineEvent::Progress { current, total });
    }

    fn on_finished(&mut self, success: bool, message: &str) {
        self.busy.store(false, Ordering::Release);
        let _ = self.events.send(PipelineEvent::Finished {
            success,
            message: message.to_string(),
        });
    }
}

/// Single-slot pipeline worker
pub struct PipelineWorker {
    jobs: Option<Sender<Job>>,
    events: Receiver<PipelineEvent>,
    busy: Arc<AtomicBool>,
    active: Arc<Mutex<Option<CancelFlag>>>,
    handle: Option<JoinHandle<()>>,
}

impl PipelineWorker {
    pub fn spawn<B, M>(backend: B, model: M, config: PipelineConfig) -> std::io::Result<Self>
    where
        B: MediaBackend + Clone + Send + 'static,
        M: SegmentationModel + Clone + Send + 'static,
    {
        let (job_tx, job_rx) = channel::bounded::<Job>(1);
        let (event_tx, event_rx) = channel::unbounded();
        let busy = Arc::new(AtomicBool::new(false));

        let worker_busy = Arc::clone(&busy);
        let handle = std::thread::Builder::new()
            .name("pipeline-worker".to_string())
            .spawn(move || {
                for job in job_rx.iter() {
                    let run = panic::catch_unwind(AssertUnwindSafe(|| {
                        let mut driver =
                            PipelineDriver::new(backend.clone(), model.clone(), config)
                                .with_cancel_flag(job.cancel);
                        let mut observer = SlotObserver {
                            events: &event_tx,
                            busy: &worker_busy,
                        };
                        // Outcome already went out as the Finished event
                        let _ = driver.start(&job.source, &job.sink, &mut observer);
                    }));
                    if run.is_err() {
                        tracing::error!("Pipeline run panicked: {}", job.source.display());
                        SlotObserver {
                            events: &event_tx,
                            busy: &worker_busy,
                        }
                        .on_finished(false, "Pipeline run panicked");
                    }
                }
                tracing::debug!("Pipeline worker exiting");
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            events: event_rx,
            busy,
            active: Arc::new(Mutex::new(None)),
            handle: Some(handle),
        })
    }

    /// Queue a run. Rejected while another run is queued or active.
    pub fn submit(
        &self,
        source: impl Into<PathBuf>,
        sink: impl Into<PathBuf>,
    ) -> Result<CancelFlag, WorkerError> {
        let jobs = self.jobs.as_ref().ok_or(WorkerError::Stopped)?;
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WorkerError::Busy);
        }

        let cancel = CancelFlag::new();
        let job = Job {
            source: source.into(),
            sink: sink.into(),
            cancel: cancel.clone(),
        };

        match jobs.try_send(job) {
            Ok(()) => {
                *self.active.lock() = Some(cancel.clone());
                Ok(cancel)
            }
            Err(err) => {
                self.busy.store(false, Ordering::Release);
                Err(match err {
                    TrySendError::Full(_) => WorkerError::Busy,
                    TrySendError::Disconnected(_) => WorkerError::Stopped,
                })
            }
        }
    }

    /// Ask the most recently submitted run to stop before its next frame
    pub fn cancel(&self) {
        if let Some(flag) = self.active.lock().as_ref() {
            flag.cancel();
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Progress and terminal events, in emission order
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        self.jobs = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Pipeline worker panicked");
            }
        }
    }
}
