use super::probe::{probe_video, VideoInfo};
use super::FrameSource;
use crate::error::{MediaError, MediaResult};
use crate::media::StderrDrain;
use crate::segmentation::Frame;
use std::ffi::OsString;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Decodes a video file into RGB frames through an `ffmpeg` child process
///
/// Frames arrive on the child's stdout as packed `rgb24`, one
/// `width * height * 3` block per frame, in decode order.
pub struct FfmpegSource {
    path: PathBuf,
    info: VideoInfo,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr: StderrDrain,
    frames_read: u64,
    closed: bool,
}

/// Arguments for a raw `rgb24` decode of the first video stream.
/// Every decoded frame is emitted exactly once; `passthrough` keeps the
/// rawvideo muxer from duplicating or dropping frames on variable-rate input.
fn decode_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_os_string());
    args.extend(
        [
            "-map", "0:v:0", "-an", "-sn", "-dn", "-fps_mode", "passthrough", "-f", "rawvideo",
            "-pix_fmt", "rgb24", "-",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P) -> MediaResult<Self> {
        let path = path.as_ref();
        let info = probe_video(path)?;
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::ToolNotFound("ffmpeg"))?;

        tracing::info!(
            "Opening {} ({}x{}, {:.2} fps, ~{} frames, {})",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.frame_count,
            info.codec
        );

        let mut child = Command::new(ffmpeg)
            .args(decode_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MediaError::ffmpeg_failed("decode", format!("Failed to spawn FFmpeg: {e}"), None)
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("decode", "Failed to capture FFmpeg stdout", None)
        })?;
        let stderr = StderrDrain::spawn(child.stderr.take());

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            stderr,
            frames_read: 0,
            closed: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn frame_bytes(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    /// Reap the decoder after end of stream and surface a non-zero exit
    fn finish(&mut self) -> MediaResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        let stderr = self.stderr.collect();
        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                "decode",
                format!("{} after {} frames of {}", status, self.frames_read, self.path.display()),
                stderr,
            ));
        }
        tracing::debug!("Decoder finished after {} frames", self.frames_read);
        Ok(())
    }
}

/// Fill `buf` unless the stream ends first; returns the bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl FrameSource for FfmpegSource {
    fn frame_rate(&self) -> f64 {
        self.info.fps
    }

    fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    fn resolution(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.closed {
            return Err(MediaError::Closed);
        }
        let expected = self.frame_bytes();
        let Some(reader) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; expected];
        let got = read_full(reader, &mut buf)?;
        if got == 0 {
            self.finish()?;
            return Ok(None);
        }
        if got < expected {
            return Err(MediaError::TruncatedFrame { got, expected });
        }

        self.frames_read += 1;
        Frame::from_raw(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or(MediaError::TruncatedFrame { got, expected })
    }

    fn close(&mut self) -> MediaResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            // Early termination: the decoder may still be producing frames
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            child.wait()?;
            self.stderr.collect();
            tracing::debug!("Decoder stopped early after {} frames", self.frames_read);
        }
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to release decoder for {}: {}", self.path.display(), e);
        }
    }
}
