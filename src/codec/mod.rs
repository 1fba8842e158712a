//! Codec-specific bitstream handling.
//!
//! Each video track owns a byte-stream to NAL-unit-stream converter selected
//! once at setup: Annex B access units go in, length-prefixed samples with
//! per-NAL clear-leader plans come out, and parameter sets accumulate into
//! the decoder configuration record (`avcC`/`hvcC`).

pub mod common;
pub mod h264;
pub mod h265;

use crate::error::Result;
use std::fmt;
use std::str::FromStr;

/// Supported video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264/AVC, Annex B input.
    H264,
    /// H.265/HEVC, Annex B input with VPS/SPS/PPS.
    H265,
}

impl VideoCodec {
    /// The sample-entry fourcc for this codec (`avc1`/`hvc1`).
    pub fn sample_entry_fourcc(self) -> [u8; 4] {
        match self {
            VideoCodec::H264 => *b"avc1",
            VideoCodec::H265 => *b"hvc1",
        }
    }

    /// The decoder-configuration box fourcc (`avcC`/`hvcC`).
    pub fn config_box_fourcc(self) -> [u8; 4] {
        match self {
            VideoCodec::H264 => *b"avcC",
            VideoCodec::H265 => *b"hvcC",
        }
    }

    /// Construct the converter for this codec.
    pub fn new_converter(self) -> Box<dyn BitstreamConverter> {
        match self {
            VideoCodec::H264 => Box::new(h264::H264Converter::new()),
            VideoCodec::H265 => Box::new(h265::H265Converter::new()),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoCodec::H264 => write!(f, "H.264"),
            VideoCodec::H265 => write!(f, "H.265"),
        }
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "h264" | "h.264" | "avc" => Ok(VideoCodec::H264),
            "h265" | "h.265" | "hevc" => Ok(VideoCodec::H265),
            _ => Err(format!("unknown video codec: {}", s)),
        }
    }
}

/// The span of one NAL unit inside a converted (length-prefixed) sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaluSpan {
    /// Byte offset of the 4-byte length prefix within the sample.
    pub offset: usize,
    /// Total span size: length prefix plus NAL payload.
    pub size: usize,
    /// Leading bytes (including the length prefix) that must stay clear
    /// when the sample is encrypted.
    pub clear_leader: usize,
}

/// One access unit after byte-stream to unit-stream conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertedSample {
    /// Length-prefixed NAL units, parameter sets stripped.
    pub data: Vec<u8>,
    /// One span per emitted NAL, in stream order.
    pub nalus: Vec<NaluSpan>,
    /// True when the unit contains an IDR/IRAP slice.
    pub is_key_frame: bool,
}

/// Byte-stream to NAL-unit-stream conversion for one track.
///
/// Implementations cache parameter sets as they are observed; a parameter
/// set that changes mid-stream is refused with a parser failure so the
/// decoder configuration record is never silently rewritten.
pub trait BitstreamConverter {
    /// The codec this converter handles.
    fn codec(&self) -> VideoCodec;

    /// Convert one Annex B access unit into length-prefixed form.
    fn convert(&mut self, access_unit: &[u8]) -> Result<ConvertedSample>;

    /// Serialized decoder configuration record payload (`avcC`/`hvcC`
    /// contents), available once parameter sets have been observed.
    fn decoder_config_record(&self) -> Option<Vec<u8>>;
}
