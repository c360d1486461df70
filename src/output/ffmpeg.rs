use super::{FrameSink, SinkSettings};
use crate::error::{MediaError, MediaResult};
use crate::media::StderrDrain;
use crate::segmentation::Frame;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Encodes RGB frames into a silent MP4 through an `ffmpeg` child process
pub struct FfmpegSink {
    path: PathBuf,
    settings: SinkSettings,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: StderrDrain,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn open<P: AsRef<Path>>(path: P, settings: SinkSettings) -> MediaResult<Self> {
        let path = path.as_ref();

        if settings.width == 0 || settings.height == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "cannot encode {}x{} frames",
                settings.width, settings.height
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(MediaError::MissingDirectory(parent.to_path_buf()));
            }
        }
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::ToolNotFound("ffmpeg"))?;

        tracing::info!(
            "Opening {} for writing ({}x{} @ {:.2} fps, {})",
            path.display(),
            settings.width,
            settings.height,
            settings.frame_rate,
            settings.codec
        );

        let mut child = Command::new(ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", settings.width, settings.height))
            .arg("-r")
            .arg(format!("{}", settings.frame_rate))
            .args(["-i", "-", "-an"])
            .args(settings.codec.ffmpeg_args())
            .args(["-f", "mp4"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MediaError::ffmpeg_failed("encode", format!("Failed to spawn FFmpeg: {e}"), None)
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("encode", "Failed to capture FFmpeg stdin", None)
        })?;
        let stderr = StderrDrain::spawn(child.stderr.take());

        Ok(Self {
            path: path.to_path_buf(),
            settings,
            child: Some(child),
            stdin: Some(stdin),
            stderr,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Wait for the encoder and turn a non-zero exit into an error
    fn reap(&mut self, context: &str) -> MediaResult<()> {
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        let stderr = self.stderr.collect();
        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                "encode",
                format!("{context}: {status} writing {}", self.path.display()),
                stderr,
            ));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> MediaResult<()> {
        let expected = self.resolution();
        if frame.dimensions() != expected {
            return Err(MediaError::FrameSizeMismatch {
                got: frame.dimensions(),
                expected,
            });
        }
        let stdin = self.stdin.as_mut().ok_or(MediaError::Closed)?;

        match stdin.write_all(frame.as_raw()) {
            Ok(()) => {
                self.frames_written += 1;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // Encoder exited; its stderr says why
                self.reap("encoder exited early")?;
                Err(MediaError::Io(e))
            }
            Err(e) => Err(MediaError::Io(e)),
        }
    }

    fn close(&mut self) -> MediaResult<()> {
        if self.child.is_none() {
            return Ok(());
        }
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        self.reap("finalize")?;
        tracing::debug!(
            "Finalized {} with {} frames",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.settings.width, self.settings.height)
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to finalize {}: {}", self.path.display(), e);
        }
    }
}
