use crate::error::MediaError;
use std::fmt;
use std::str::FromStr;

/// Output encoding, selected by FourCC
///
/// Only MPEG-4 Part 2 (`mp4v`) in an MP4 container is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCodec {
    #[default]
    Mp4v,
}

impl OutputCodec {
    pub fn fourcc(self) -> &'static str {
        match self {
            Self::Mp4v => "mp4v",
        }
    }

    /// Encoder arguments for ffmpeg
    pub(crate) fn ffmpeg_args(self) -> &'static [&'static str] {
        match self {
            Self::Mp4v => &["-c:v", "mpeg4", "-tag:v", "mp4v", "-q:v", "3", "-pix_fmt", "yuv420p"],
        }
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fourcc())
    }
}

impl FromStr for OutputCodec {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4v" => Ok(Self::Mp4v),
            other => Err(MediaError::UnsupportedCodec(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_parsing() {
        assert_eq!("MP4V".parse::<OutputCodec>().unwrap(), OutputCodec::Mp4v);
        assert_eq!(OutputCodec::default().to_string(), "mp4v");
        assert!(matches!(
            "avc1".parse::<OutputCodec>(),
            Err(MediaError::UnsupportedCodec(c)) if c == "avc1"
        ));
    }
}
