use crate::composite::BackgroundColor;
use crate::output::OutputCodec;

/// Output file written when the caller does not name one.
pub const DEFAULT_OUTPUT: &str = "background_removed.mp4";

/// Per-run settings. Everything else about a run is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineConfig {
    /// Color substituted for background pixels
    pub background: BackgroundColor,
    /// Output encoding
    pub codec: OutputCodec,
}

impl PipelineConfig {
    pub fn with_background(mut self, background: BackgroundColor) -> Self {
        self.background = background;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.background, BackgroundColor::BLACK);
        assert_eq!(config.codec, OutputCodec::Mp4v);
        assert_eq!(
            config.with_background(BackgroundColor([0, 255, 0])).background,
            BackgroundColor([0, 255, 0])
        );
    }
}
