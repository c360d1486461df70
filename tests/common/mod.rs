#![allow(dead_code)]

use anyhow::{bail, Result};
use bgstrip::error::{MediaError, MediaResult};
use bgstrip::media::MediaBackend;
use bgstrip::output::{FrameSink, SinkSettings};
use bgstrip::segmentation::{Frame, ProbabilityMap, SegmentationModel};
use bgstrip::source::FrameSource;
use crossbeam::channel::Receiver;
use image::{Luma, Rgb};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

pub const PERSON: Rgb<u8> = Rgb([200, 60, 40]);
pub const WALL: Rgb<u8> = Rgb([20, 180, 30]);
/// Frames whose first pixel has this color make [`KeyedModel`] fail
pub const POISON: Rgb<u8> = Rgb([255, 0, 255]);

/// Everything the in-memory media saw during a run
#[derive(Default)]
pub struct MediaLog {
    pub source_opens: u32,
    pub source_closes: u32,
    pub sink_settings: Option<SinkSettings>,
    pub sink_closes: u32,
    pub written: Vec<Frame>,
}

/// Source and sink that live in memory
#[derive(Clone)]
pub struct MemoryBackend {
    pub frames: Vec<Frame>,
    pub reported_count: u64,
    pub fps: f64,
    pub fail_read_after: Option<usize>,
    pub fail_sink_open: bool,
    pub log: Arc<Mutex<MediaLog>>,
}

impl MemoryBackend {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            reported_count: frames.len() as u64,
            frames,
            fps: 25.0,
            fail_read_after: None,
            fail_sink_open: false,
            log: Arc::new(Mutex::new(MediaLog::default())),
        }
    }

    pub fn written(&self) -> Vec<Frame> {
        self.log.lock().written.clone()
    }
}

pub struct MemorySource {
    frames: VecDeque<Frame>,
    resolution: (u32, u32),
    reported_count: u64,
    fps: f64,
    fail_read_after: Option<usize>,
    read: usize,
    log: Arc<Mutex<MediaLog>>,
}

impl FrameSource for MemorySource {
    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.reported_count
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.fail_read_after == Some(self.read) {
            return Err(MediaError::TruncatedFrame {
                got: 1,
                expected: 3,
            });
        }
        self.read += 1;
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) -> MediaResult<()> {
        self.log.lock().source_closes += 1;
        Ok(())
    }
}

pub struct MemorySink {
    settings: SinkSettings,
    log: Arc<Mutex<MediaLog>>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> MediaResult<()> {
        let expected = self.resolution();
        if frame.dimensions() != expected {
            return Err(MediaError::FrameSizeMismatch {
                got: frame.dimensions(),
                expected,
            });
        }
        self.log.lock().written.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> MediaResult<()> {
        self.log.lock().sink_closes += 1;
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.settings.width, self.settings.height)
    }
}

impl MediaBackend for MemoryBackend {
    type Source = MemorySource;
    type Sink = MemorySink;

    fn open_source(&self, path: &Path) -> MediaResult<MemorySource> {
        if !path.is_file() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        self.log.lock().source_opens += 1;
        let resolution = self
            .frames
            .first()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0));
        Ok(MemorySource {
            frames: self.frames.iter().cloned().collect(),
            resolution,
            reported_count: self.reported_count,
            fps: self.fps,
            fail_read_after: self.fail_read_after,
            read: 0,
            log: Arc::clone(&self.log),
        })
    }

    fn open_sink(&self, path: &Path, settings: SinkSettings) -> MediaResult<MemorySink> {
        if self.fail_sink_open {
            return Err(MediaError::MissingDirectory(path.to_path_buf()));
        }
        self.log.lock().sink_settings = Some(settings);
        Ok(MemorySink {
            settings,
            log: Arc::clone(&self.log),
        })
    }
}

/// Marks pixels of one key color as foreground; `None` keys everything.
/// Fails on frames starting with [`POISON`].
#[derive(Clone)]
pub struct KeyedModel {
    pub key: Option<Rgb<u8>>,
    pub gate: Option<Receiver<()>>,
}

impl KeyedModel {
    pub fn keyed(key: Rgb<u8>) -> Self {
        Self {
            key: Some(key),
            gate: None,
        }
    }

    pub fn everything() -> Self {
        Self {
            key: None,
            gate: None,
        }
    }

    /// Block every frame until a token arrives on `gate`
    pub fn gated(gate: Receiver<()>) -> Self {
        Self {
            key: None,
            gate: Some(gate),
        }
    }
}

impl SegmentationModel for KeyedModel {
    fn segment(&mut self, frame: &Frame) -> Result<ProbabilityMap> {
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if frame.width() > 0 && frame.get_pixel(0, 0) == &POISON {
            bail!("unreadable frame");
        }
        let (w, h) = frame.dimensions();
        Ok(ProbabilityMap::from_fn(w, h, |x, y| {
            let hit = self.key.map_or(true, |key| frame.get_pixel(x, y) == &key);
            Luma([if hit { 1.0 } else { 0.0 }])
        }))
    }

    fn input_size(&self) -> (u32, u32) {
        (16, 16)
    }
}

pub fn solid(width: u32, height: u32, color: Rgb<u8>) -> Frame {
    Frame::from_pixel(width, height, color)
}

/// Left half `left`, right half `right`
pub fn split(width: u32, height: u32, left: Rgb<u8>, right: Rgb<u8>) -> Frame {
    Frame::from_fn(width, height, |x, _| if x < width / 2 { left } else { right })
}

/// A real file to stand in as the input path
pub fn input_file() -> tempfile::NamedTempFile {
    tempfile::Builder::new()
        .suffix(".mp4")
        .tempfile()
        .expect("create temp input")
}
