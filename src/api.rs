//! Public API types: samples, track configuration, the segment listener,
//! and the output abstraction.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::codec::VideoCodec;

/// One media access unit with its timing metadata.
///
/// Video samples carry an Annex B elementary stream; timestamps and the
/// duration are in the track's timescale units. DTS must be
/// non-decreasing within a track.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Raw access-unit payload (Annex B for H.264/H.265).
    pub data: Vec<u8>,
    /// Decode timestamp in timescale units.
    pub dts: u64,
    /// Presentation timestamp in timescale units.
    pub pts: u64,
    /// Duration in timescale units.
    pub duration: u32,
    /// True for stream access points (IDR/IRAP).
    pub is_key_frame: bool,
    /// Optional per-sample IV, replacing the derived IV for this sample.
    pub iv_override: Option<Vec<u8>>,
}

impl Sample {
    /// A sample with pts == dts and no side data.
    pub fn new(data: Vec<u8>, dts: u64, duration: u32, is_key_frame: bool) -> Self {
        Self {
            data,
            dts,
            pts: dts,
            duration,
            is_key_frame,
            iv_override: None,
        }
    }
}

/// Static configuration of one track.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pub codec: VideoCodec,
    /// Track identifier used in `tkhd`/`trex`/`tfhd`; must be unique and
    /// non-zero.
    pub track_id: u32,
    /// Media timescale (90000 is the common video choice).
    pub timescale: u32,
    pub width: u32,
    pub height: u32,
    /// ISO 639-2/T language code; `None` writes `und`.
    pub language: Option<String>,
}

/// Summary counters reported when the segmenter finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SegmenterStats {
    pub segments_written: u64,
    pub fragments_written: u64,
    pub samples_in: u64,
    pub samples_dropped: u64,
    pub bytes_written: u64,
    /// Total duration of written segments, in the reference track's
    /// timescale.
    pub duration: u64,
}

/// Segment lifecycle notifications.
///
/// All methods default to no-ops so implementors override only what they
/// consume (an MPD writer typically wants `on_new_segment`).
pub trait MuxerListener {
    /// A segment was fully written. `earliest_pts` and `duration` are in
    /// the reference track's timescale.
    fn on_new_segment(&mut self, file_name: &str, earliest_pts: u64, duration: u64, size: u64) {
        let _ = (file_name, earliest_pts, duration, size);
    }

    /// The reference track's sample duration is known.
    fn on_sample_duration_ready(&mut self, sample_duration: u32) {
        let _ = sample_duration;
    }

    /// Encryption was configured; emitted once before the first sample is
    /// processed.
    fn on_encryption_info_ready(&mut self, scheme: &str, key_id: &[u8; 16], iv: &[u8]) {
        let _ = (scheme, key_id, iv);
    }

    /// The stream ended and all output is flushed.
    fn on_media_end(&mut self, stats: &SegmenterStats) {
        let _ = stats;
    }
}

/// The file abstraction the segmenter writes through.
///
/// Segments are assembled fully in memory, so one whole-file write per
/// segment is all that is needed; no hidden temp files, no partial
/// rewrites.
pub trait SegmentOutput {
    /// Create (or replace) `name` with `data`.
    fn write_file(&mut self, name: &str, data: &[u8]) -> io::Result<()>;
}

/// Writes segments to the local filesystem, creating parent directories
/// as needed.
#[derive(Debug, Default)]
pub struct DiskOutput {
    /// Optional directory all relative names resolve against.
    base_dir: Option<PathBuf>,
}

impl DiskOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(name),
            None => PathBuf::from(name),
        }
    }
}

impl SegmentOutput for DiskOutput {
    fn write_file(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            if parent != Path::new("") {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, data)
    }
}

/// In-memory output capturing every written file, shared with the test
/// that owns it.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    order: Arc<Mutex<Vec<String>>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bytes last written under `name`, if any.
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(name).cloned()
    }

    /// File names in first-write order.
    pub fn file_names(&self) -> Vec<String> {
        self.order.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn file_count(&self) -> usize {
        self.file_names().len()
    }
}

impl SegmentOutput for MemoryOutput {
    fn write_file(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| io::Error::other("memory output poisoned"))?;
        if !files.contains_key(name) {
            if let Ok(mut order) = self.order.lock() {
                order.push(name.to_string());
            }
        }
        files.insert(name.to_string(), data.to_vec());
        Ok(())
    }
}
