use super::types::{Frame, ProbabilityMap};
use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use ndarray::Array4;
use std::fmt;
use std::str::FromStr;

/// Memory layout the model expects for its input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// [1, height, width, 3] (MediaPipe / TFLite exports)
    #[default]
    Nhwc,
    /// [1, 3, height, width] (PyTorch exports)
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(format!("unknown tensor layout '{other}' (expected nhwc or nchw)")),
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nhwc => "nhwc",
            Self::Nchw => "nchw",
        })
    }
}

/// Preprocessor for converting RGB frames to model input tensors
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    layout: TensorLayout,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32, layout: TensorLayout) -> Self {
        Self {
            target_width,
            target_height,
            layout,
        }
    }

    /// Preprocess an RGB frame into a normalized 4-D tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions (bilinear)
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Lay out as NHWC or NCHW
    pub fn preprocess(&self, frame: &Frame) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            bail!("cannot segment a {}x{} frame", width, height);
        }

        let resized = if frame.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                frame,
                self.target_width,
                self.target_height,
                FilterType::Triangle,
            )
        } else {
            frame.clone()
        };

        let h = self.target_height as usize;
        let w = self.target_width as usize;
        let value = |x: usize, y: usize, c: usize| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        };

        let tensor = match self.layout {
            TensorLayout::Nhwc => Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| value(x, y, c)),
            TensorLayout::Nchw => Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| value(x, y, c)),
        };

        Ok(tensor)
    }

    /// Split a tensor into the (shape, data) pair the runtime consumes
    pub fn into_parts(tensor: Array4<f32>) -> (Vec<usize>, Vec<f32>) {
        let shape = tensor.shape().to_vec();
        let tensor = if tensor.is_standard_layout() {
            tensor
        } else {
            tensor.as_standard_layout().into_owned()
        };
        let (data, _) = tensor.into_raw_vec_and_offset();
        (shape, data)
    }

    /// Postprocess model output back to frame dimensions
    ///
    /// # Arguments
    /// * `matte` - Flattened single-channel output at model resolution
    /// * `matte_width` / `matte_height` - Model output resolution
    /// * `target_width` / `target_height` - Frame resolution
    pub fn postprocess(
        matte: &[f32],
        matte_width: u32,
        matte_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<ProbabilityMap> {
        let _span = tracing::debug_span!("postprocess").entered();

        let expected = matte_width as usize * matte_height as usize;
        if matte.len() != expected {
            bail!(
                "model output has {} values, expected {}x{}",
                matte.len(),
                matte_width,
                matte_height
            );
        }

        let clamped: Vec<f32> = matte.iter().map(|v| v.clamp(0.0, 1.0)).collect();
        let map = ProbabilityMap::from_raw(matte_width, matte_height, clamped)
            .context("model output does not fit its reported shape")?;

        if (matte_width, matte_height) == (target_width, target_height) {
            return Ok(map);
        }

        Ok(imageops::resize(
            &map,
            target_width,
            target_height,
            FilterType::Triangle,
        ))
    }
}
