use super::preprocess::{Preprocessor, TensorLayout};
use super::types::{Frame, ProbabilityMap, SegmentationModel};
use anyhow::{anyhow, bail, Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use std::path::Path;

/// Session options for [`SelfieSegmenter`]
#[derive(Debug, Clone)]
pub struct SelfieOptions {
    pub input_width: u32,
    pub input_height: u32,
    pub layout: TensorLayout,
    pub intra_threads: usize,
}

impl Default for SelfieOptions {
    /// MediaPipe landscape selfie-segmentation export: 256x144 NHWC
    fn default() -> Self {
        Self {
            input_width: 256,
            input_height: 144,
            layout: TensorLayout::Nhwc,
            intra_threads: 4,
        }
    }
}

/// Person segmentation backed by an ONNX selfie-segmentation model
///
/// Stateless between frames; the session is the only thing carried
/// across calls.
pub struct SelfieSegmenter {
    session: Session,
    preprocessor: Preprocessor,
    options: SelfieOptions,
}

impl SelfieSegmenter {
    /// Load a model from an ONNX file
    pub fn new<P: AsRef<Path>>(model_path: P, options: SelfieOptions) -> Result<Self> {
        let path = model_path.as_ref();
        if !path.is_file() {
            bail!("model file not found: {}", path.display());
        }

        tracing::info!("Loading segmentation model from {}", path.display());

        let builder = Session::builder()
            .map_err(|e| anyhow!("ORT session builder: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("ORT optimization level: {e}"))?
            .with_intra_threads(options.intra_threads)
            .map_err(|e| anyhow!("ORT intra threads: {e}"))?;

        #[cfg(feature = "cuda")]
        let builder = {
            use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
            builder
                .with_execution_providers([
                    TensorRTExecutionProvider::default().build(),
                    CUDAExecutionProvider::default().build(),
                ])
                .map_err(|e| anyhow!("ORT execution providers: {e}"))?
        };

        let session = builder
            .commit_from_file(path)
            .map_err(|e| anyhow!("ORT load model: {e}"))
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!(
            "Segmentation model loaded ({}x{} {:?})",
            options.input_width,
            options.input_height,
            options.layout
        );

        let preprocessor =
            Preprocessor::new(options.input_width, options.input_height, options.layout);

        Ok(Self {
            session,
            preprocessor,
            options,
        })
    }
}

impl SegmentationModel for SelfieSegmenter {
    fn segment(&mut self, frame: &Frame) -> Result<ProbabilityMap> {
        let _span = tracing::debug_span!("selfie_segment").entered();

        let tensor = self.preprocessor.preprocess(frame)?;
        let (shape, data) = Preprocessor::into_parts(tensor);
        let input = Tensor::from_array((shape, data.into_boxed_slice()))
            .map(<Value>::from)
            .map_err(|e| anyhow!("ORT tensor: {e}"))?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| anyhow!("ORT run failed: {e}"))?;
        drop(_infer_span);

        let (shape, values) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("ORT extract: {e}"))?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        let (height, width, channels) = match (self.options.layout, dims.as_slice()) {
            (_, [1, h, w]) => (*h, *w, 1),
            (TensorLayout::Nhwc, [1, h, w, c]) => (*h, *w, *c),
            (TensorLayout::Nchw, [1, c, h, w]) => (*h, *w, *c),
            _ => bail!("unexpected segmentation output shape {:?}", dims),
        };
        if channels == 0 || values.len() < height * width * channels {
            bail!("segmentation output shape {:?} does not match its data", dims);
        }

        // Multi-class exports put the person class last
        let foreground = channels - 1;
        let matte: Vec<f32> = match self.options.layout {
            TensorLayout::Nhwc => values
                .iter()
                .skip(foreground)
                .step_by(channels)
                .take(height * width)
                .copied()
                .collect(),
            TensorLayout::Nchw => {
                values[foreground * height * width..(foreground + 1) * height * width].to_vec()
            }
        };

        let (frame_width, frame_height) = frame.dimensions();
        Preprocessor::postprocess(
            &matte,
            width as u32,
            height as u32,
            frame_width,
            frame_height,
        )
    }

    fn input_size(&self) -> (u32, u32) {
        (self.options.input_width, self.options.input_height)
    }
}
