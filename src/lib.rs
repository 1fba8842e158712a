//! # dashmux
//!
//! **Pure-Rust DASH fragmented-MP4 segmenter with Common Encryption.**
//!
//! ## Core Invariant
//!
//! > dashmux guarantees that any correctly-timestamped, already-encoded
//! > H.264/H.265 elementary stream can be turned into standards-compliant
//! > DASH segments (indexed single file or independently addressable
//! > segment files) with samples optionally encrypted under any of the
//! > four CENC protection schemes (`cenc`, `cens`, `cbc1`, `cbcs`).
//!
//! ## What dashmux Does
//!
//! - Converts Annex B byte streams to length-prefixed NAL unit streams
//!   and extracts SPS/PPS/VPS into `avcC`/`hvcC`
//! - Groups samples into fragments and segments bounded by stream access
//!   points, with byte-exact `moof`/`mdat`/`sidx`/`styp` serialization
//! - Encrypts samples in place with AES-CTR or AES-CBC, subsample and
//!   pattern aware, emitting consistent `saiz`/`saio`/`senc`/`tenc`
//! - Names segment files from DASH templates (`$Number$`, `$Time$`, ...)
//!
//! ## What dashmux Does NOT Do
//!
//! - Encode, decode, or transcode media
//! - Demux input containers (it consumes elementary-stream samples)
//! - Write MPD manifests or HLS playlists
//! - Acquire DRM licenses or talk to key servers
//! - Produce non-ISO-BMFF containers (no MPEG-TS, no WebM)
//!
//! # Example
//!
//! ```no_run
//! use dashmux::api::{DiskOutput, Sample, TrackConfig};
//! use dashmux::codec::VideoCodec;
//! use dashmux::config::MuxerOptions;
//! use dashmux::segmenter::SegmenterBuilder;
//!
//! # fn main() -> Result<(), dashmux::error::Error> {
//! let options = MuxerOptions {
//!     output_file_name: "init.mp4".into(),
//!     segment_template: "seg_$Number%05d$.m4s".into(),
//!     ..Default::default()
//! };
//! let mut segmenter = SegmenterBuilder::new(options)
//!     .add_track(TrackConfig {
//!         codec: VideoCodec::H264,
//!         track_id: 1,
//!         timescale: 90_000,
//!         width: 1280,
//!         height: 720,
//!         language: None,
//!     })
//!     .build(DiskOutput::new())?;
//!
//! // Feed Annex B access units (encoded elsewhere).
//! // segmenter.add_sample(1, &Sample::new(annexb_bytes, dts, 3000, is_idr))?;
//!
//! let stats = segmenter.finalize()?;
//! # let _ = stats;
//! # Ok(())
//! # }
//! ```

// Public API surface: samples, tracks, listener, outputs.
pub mod api;

// ISO-BMFF box serialization.
pub mod boxes;

// Codec bitstream conversion (Annex B -> NAL unit stream).
pub mod codec;

// Muxer options and encryption parameters.
pub mod config;

// Common Encryption primitives and the sample pipeline.
pub mod crypto;

// Error taxonomy.
pub mod error;

// Per-track fragment accumulation.
pub mod fragmenter;

// Runtime invariant checking framework.
pub mod invariants;

// Segment orchestration and output routing.
pub mod segmenter;

// Dry-run validation utilities.
pub mod validation;

pub use api::{
    DiskOutput, MemoryOutput, MuxerListener, Sample, SegmentOutput, SegmenterStats, TrackConfig,
};
pub use config::{EncryptionParams, MuxerOptions, ProtectionScheme};
pub use error::{Error, Result};
pub use segmenter::{Segmenter, SegmenterBuilder};
