mod preprocess;
mod selfie;
pub mod shared;
pub mod types;

pub use preprocess::{Preprocessor, TensorLayout};
pub use selfie::{SelfieOptions, SelfieSegmenter};
pub use shared::SharedModel;
pub use types::{BinaryMask, Frame, ProbabilityMap, SegmentationModel};

use anyhow::Result;
use std::path::Path;

/// Load the default segmentation model and install it process-wide
pub fn load_default_model(model_path: &Path, options: SelfieOptions) -> Result<SharedModel> {
    let model = SelfieSegmenter::new(model_path, options)?;
    shared::install(model)
}
