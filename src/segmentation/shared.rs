//! Process-wide segmentation model.
//!
//! The model is loaded once and reused for every frame of every run. The
//! underlying session is not safe for concurrent inference, so every call
//! goes through one mutex; callers that share a [`SharedModel`] across
//! threads serialize on it.

use super::types::{Frame, ProbabilityMap, SegmentationModel};
use anyhow::{bail, Result};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

type DynModel = dyn SegmentationModel + Send;

/// Cloneable handle to a single model instance
#[derive(Clone)]
pub struct SharedModel {
    inner: Arc<Mutex<Box<DynModel>>>,
    input_size: (u32, u32),
}

impl SharedModel {
    pub fn new<M: SegmentationModel + Send + 'static>(model: M) -> Self {
        let input_size = model.input_size();
        Self {
            inner: Arc::new(Mutex::new(Box::new(model))),
            input_size,
        }
    }

    /// Number of live handles to the model
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl SegmentationModel for SharedModel {
    fn segment(&mut self, frame: &Frame) -> Result<ProbabilityMap> {
        self.inner.lock().segment(frame)
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}

static GLOBAL: OnceLock<SharedModel> = OnceLock::new();

/// Install the process-wide model. Fails if one is already installed.
pub fn install<M: SegmentationModel + Send + 'static>(model: M) -> Result<SharedModel> {
    let shared = SharedModel::new(model);
    if GLOBAL.set(shared.clone()).is_err() {
        bail!("a segmentation model is already installed");
    }
    tracing::debug!("Installed process-wide segmentation model");
    Ok(shared)
}

/// The process-wide model, if [`install`] has run
pub fn global() -> Option<SharedModel> {
    GLOBAL.get().cloned()
}
