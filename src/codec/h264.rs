//! H.264/AVC byte-stream to NAL-unit-stream conversion.
//!
//! # NAL Unit Types
//!
//! | Type | Name | Purpose |
//! |------|------|---------|
//! | 1 | Non-IDR slice | P/B frame data |
//! | 2-4 | Slice partitions | Data partitioning |
//! | 5 | IDR slice | Keyframe (I-frame) |
//! | 6 | SEI | Supplemental enhancement info |
//! | 7 | SPS | Sequence Parameter Set |
//! | 8 | PPS | Picture Parameter Set |
//!
//! SPS/PPS never appear in converted sample data; they live in the `avcC`
//! decoder configuration record instead.

use super::common::{AnnexBNalIter, has_start_code, NAL_LENGTH_PREFIX_SIZE, VCL_CLEAR_LEAD};
use super::{BitstreamConverter, ConvertedSample, NaluSpan, VideoCodec};
use crate::error::{Error, Result};

/// H.264 NAL unit type constants.
pub mod nal_type {
    /// Non-IDR coded slice (P/B frame)
    pub const NON_IDR_SLICE: u8 = 1;
    /// Coded slice data partition A
    pub const SLICE_DATA_A: u8 = 2;
    /// Coded slice data partition B
    pub const SLICE_DATA_B: u8 = 3;
    /// Coded slice data partition C
    pub const SLICE_DATA_C: u8 = 4;
    /// IDR coded slice (keyframe)
    pub const IDR_SLICE: u8 = 5;
    /// Supplemental enhancement information
    pub const SEI: u8 = 6;
    /// Sequence Parameter Set
    pub const SPS: u8 = 7;
    /// Picture Parameter Set
    pub const PPS: u8 = 8;
    /// Access unit delimiter
    pub const AUD: u8 = 9;
}

/// Extract the NAL unit type from an H.264 NAL header (bits 0-4 of the
/// first byte).
#[inline]
pub fn h264_nal_type(nal: &[u8]) -> u8 {
    if nal.is_empty() {
        return 0;
    }
    nal[0] & 0x1f
}

/// True for the slice types that carry picture data (and therefore get a
/// clear leader rather than being left wholly clear).
#[inline]
pub fn is_vcl_nal_type(nal_type: u8) -> bool {
    (nal_type::NON_IDR_SLICE..=nal_type::IDR_SLICE).contains(&nal_type)
}

/// AVC decoder configuration: the parameter sets backing `avcC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcConfig {
    /// Sequence Parameter Set NAL unit (without start code)
    pub sps: Vec<u8>,
    /// Picture Parameter Set NAL unit (without start code)
    pub pps: Vec<u8>,
}

impl AvcConfig {
    /// Extract profile_idc from the SPS (Baseline=66, Main=77, High=100).
    pub fn profile_idc(&self) -> u8 {
        self.sps.get(1).copied().unwrap_or(66)
    }

    /// Extract profile_compatibility flags from the SPS.
    pub fn profile_compatibility(&self) -> u8 {
        self.sps.get(2).copied().unwrap_or(0)
    }

    /// Extract level_idc from the SPS (31 = level 3.1).
    pub fn level_idc(&self) -> u8 {
        self.sps.get(3).copied().unwrap_or(31)
    }

    /// Serialize the `avcC` record payload per ISO/IEC 14496-15, with
    /// `lengthSizeMinusOne = 3` (4-byte NAL length prefixes).
    pub fn serialize(&self) -> Vec<u8> {
        let mut payload = vec![
            1, // configurationVersion
            self.profile_idc(),
            self.profile_compatibility(),
            self.level_idc(),
            0xff, // 6 bits reserved + lengthSizeMinusOne = 3
            0xe1, // 3 bits reserved + 1 SPS
        ];
        payload.extend_from_slice(&(self.sps.len() as u16).to_be_bytes());
        payload.extend_from_slice(&self.sps);
        payload.push(1); // number of PPS
        payload.extend_from_slice(&(self.pps.len() as u16).to_be_bytes());
        payload.extend_from_slice(&self.pps);
        payload
    }
}

/// Converts H.264 Annex B access units into length-prefixed NAL unit
/// streams, caching SPS/PPS along the way.
pub struct H264Converter {
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl H264Converter {
    pub fn new() -> Self {
        Self {
            sps: None,
            pps: None,
        }
    }

    /// The cached parameter sets, once both have been observed.
    pub fn config(&self) -> Option<AvcConfig> {
        match (&self.sps, &self.pps) {
            (Some(sps), Some(pps)) => Some(AvcConfig {
                sps: sps.clone(),
                pps: pps.clone(),
            }),
            _ => None,
        }
    }

    fn cache_parameter_set(slot: &mut Option<Vec<u8>>, nal: &[u8], name: &str) -> Result<()> {
        match slot {
            Some(existing) if existing.as_slice() != nal => Err(Error::parser(format!(
                "{} changed mid-stream; refusing to rewrite decoder configuration",
                name
            ))),
            Some(_) => Ok(()),
            None => {
                *slot = Some(nal.to_vec());
                Ok(())
            }
        }
    }
}

impl Default for H264Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitstreamConverter for H264Converter {
    fn codec(&self) -> VideoCodec {
        VideoCodec::H264
    }

    fn convert(&mut self, access_unit: &[u8]) -> Result<ConvertedSample> {
        if !has_start_code(access_unit) {
            return Err(Error::parser("H.264 access unit has no start codes"));
        }

        let mut sample = ConvertedSample::default();
        for nal in AnnexBNalIter::new(access_unit) {
            if nal.is_empty() {
                continue;
            }
            let nal_type = h264_nal_type(nal);

            match nal_type {
                nal_type::SPS => {
                    Self::cache_parameter_set(&mut self.sps, nal, "SPS")?;
                    continue;
                }
                nal_type::PPS => {
                    Self::cache_parameter_set(&mut self.pps, nal, "PPS")?;
                    continue;
                }
                nal_type::IDR_SLICE => sample.is_key_frame = true,
                _ => {}
            }

            let offset = sample.data.len();
            sample
                .data
                .extend_from_slice(&(nal.len() as u32).to_be_bytes());
            sample.data.extend_from_slice(nal);

            // The clear leader covers the length prefix, the one-byte NAL
            // header and a conservative slice-header allowance; non-VCL
            // NALs stay wholly clear.
            let clear_payload = if is_vcl_nal_type(nal_type) {
                nal.len().min(1 + VCL_CLEAR_LEAD)
            } else {
                nal.len()
            };
            sample.nalus.push(NaluSpan {
                offset,
                size: NAL_LENGTH_PREFIX_SIZE + nal.len(),
                clear_leader: NAL_LENGTH_PREFIX_SIZE + clear_payload,
            });
        }
        Ok(sample)
    }

    fn decoder_config_record(&self) -> Option<Vec<u8>> {
        self.config().map(|config| config.serialize())
    }
}
