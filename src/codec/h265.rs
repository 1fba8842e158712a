//! H.265/HEVC byte-stream to NAL-unit-stream conversion.
//!
//! # NAL Unit Types (HEVC)
//!
//! | Type | Name | Purpose |
//! |------|------|---------|
//! | 0-31 | VCL | Coded slice segments |
//! | 16-18 | BLA | Broken Link Access |
//! | 19-20 | IDR | Instantaneous Decoder Refresh |
//! | 21 | CRA | Clean Random Access |
//! | 32 | VPS | Video Parameter Set |
//! | 33 | SPS | Sequence Parameter Set |
//! | 34 | PPS | Picture Parameter Set |
//!
//! # Differences from H.264
//!
//! - NAL header is 2 bytes; the type sits in bits 1-6 of the first byte
//! - VPS is required in addition to SPS/PPS
//! - The configuration record is `hvcC` instead of `avcC`

use super::common::{AnnexBNalIter, has_start_code, NAL_LENGTH_PREFIX_SIZE, VCL_CLEAR_LEAD};
use super::{BitstreamConverter, ConvertedSample, NaluSpan, VideoCodec};
use crate::error::{Error, Result};

/// H.265 NAL unit type constants.
pub mod nal_type {
    /// Coded slice segment of a BLA picture
    pub const BLA_W_LP: u8 = 16;
    /// IDR with RADL pictures
    pub const IDR_W_RADL: u8 = 19;
    /// IDR without leading pictures
    pub const IDR_N_LP: u8 = 20;
    /// Clean Random Access picture
    pub const CRA_NUT: u8 = 21;
    /// Reserved IRAP upper bound
    pub const RSV_IRAP_VCL23: u8 = 23;
    /// Video Parameter Set
    pub const VPS: u8 = 32;
    /// Sequence Parameter Set
    pub const SPS: u8 = 33;
    /// Picture Parameter Set
    pub const PPS: u8 = 34;
}

/// Extract the NAL unit type from an H.265 NAL header (bits 1-6 of the
/// first byte).
#[inline]
pub fn hevc_nal_type(nal: &[u8]) -> u8 {
    if nal.is_empty() {
        return 0;
    }
    (nal[0] >> 1) & 0x3f
}

/// VCL NAL types are 0-31 in HEVC.
#[inline]
pub fn is_vcl_nal_type(nal_type: u8) -> bool {
    nal_type < nal_type::VPS
}

/// IRAP (keyframe) types: BLA, IDR, CRA and the reserved IRAP range.
#[inline]
pub fn is_irap_nal_type(nal_type: u8) -> bool {
    (nal_type::BLA_W_LP..=nal_type::RSV_IRAP_VCL23).contains(&nal_type)
}

/// HEVC decoder configuration: the parameter sets backing `hvcC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcConfig {
    /// Video Parameter Set NAL unit (without start code)
    pub vps: Vec<u8>,
    /// Sequence Parameter Set NAL unit (without start code)
    pub sps: Vec<u8>,
    /// Picture Parameter Set NAL unit (without start code)
    pub pps: Vec<u8>,
}

impl HevcConfig {
    /// general_profile_space from the SPS profile_tier_level (bits 6-7 of
    /// byte 3).
    pub fn general_profile_space(&self) -> u8 {
        self.sps.get(3).map(|b| (b >> 6) & 0x03).unwrap_or(0)
    }

    /// general_tier_flag from the SPS (bit 5 of byte 3).
    pub fn general_tier_flag(&self) -> bool {
        self.sps
            .get(3)
            .map(|b| (b >> 5) & 0x01 != 0)
            .unwrap_or(false)
    }

    /// general_profile_idc from the SPS (bits 0-4 of byte 3).
    pub fn general_profile_idc(&self) -> u8 {
        self.sps.get(3).map(|b| b & 0x1f).unwrap_or(1)
    }

    /// general_level_idc from the SPS (93 = level 3.1).
    pub fn general_level_idc(&self) -> u8 {
        self.sps.get(14).copied().unwrap_or(93)
    }

    /// Serialize the `hvcC` record payload per ISO/IEC 14496-15, with
    /// `lengthSizeMinusOne = 3`.
    pub fn serialize(&self) -> Vec<u8> {
        let byte1 = (self.general_profile_space() << 6)
            | (if self.general_tier_flag() { 0x20 } else { 0 })
            | (self.general_profile_idc() & 0x1f);

        let mut payload = vec![
            1,     // configurationVersion
            byte1, // profile_space + tier + profile_idc
        ];
        // general_profile_compatibility_flags: Main profile compatible.
        payload.extend_from_slice(&[0x60, 0x00, 0x00, 0x00]);
        // general_constraint_indicator_flags
        payload.extend_from_slice(&[0x90, 0x00, 0x00, 0x00, 0x00, 0x00]);
        payload.push(self.general_level_idc());
        // min_spatial_segmentation_idc (12 bits) with reserved '1111'.
        payload.extend_from_slice(&[0xf0, 0x00]);
        payload.push(0xfc); // parallelismType + reserved
        payload.push(0xfd); // chromaFormat 4:2:0 + reserved
        payload.push(0xf8); // bitDepthLumaMinus8 + reserved
        payload.push(0xf8); // bitDepthChromaMinus8 + reserved
        payload.extend_from_slice(&0u16.to_be_bytes()); // avgFrameRate
        payload.push(0x03); // temporal layers + lengthSizeMinusOne = 3
        payload.push(3); // numOfArrays: VPS, SPS, PPS

        for (array_type, nal) in [
            (nal_type::VPS, &self.vps),
            (nal_type::SPS, &self.sps),
            (nal_type::PPS, &self.pps),
        ] {
            payload.push(0x80 | array_type); // array_completeness=1
            payload.extend_from_slice(&1u16.to_be_bytes()); // numNalus
            payload.extend_from_slice(&(nal.len() as u16).to_be_bytes());
            payload.extend_from_slice(nal);
        }
        payload
    }
}

/// Converts H.265 Annex B access units into length-prefixed NAL unit
/// streams, caching VPS/SPS/PPS along the way.
pub struct H265Converter {
    vps: Option<Vec<u8>>,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl H265Converter {
    pub fn new() -> Self {
        Self {
            vps: None,
            sps: None,
            pps: None,
        }
    }

    /// The cached parameter sets, once all three have been observed.
    pub fn config(&self) -> Option<HevcConfig> {
        match (&self.vps, &self.sps, &self.pps) {
            (Some(vps), Some(sps), Some(pps)) => Some(HevcConfig {
                vps: vps.clone(),
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

impl Default for H265Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitstreamConverter for H265Converter {
    fn codec(&self) -> VideoCodec {
        VideoCodec::H265
    }

    fn convert(&mut self, access_unit: &[u8]) -> Result<ConvertedSample> {
        if !has_start_code(access_unit) {
            return Err(Error::parser("H.265 access unit has no start codes"));
        }

        let mut sample = ConvertedSample::default();
        for nal in AnnexBNalIter::new(access_unit) {
            if nal.len() < 2 {
                continue;
            }
            let nal_type = hevc_nal_type(nal);

            match nal_type {
                nal_type::VPS => {
                    Self::cache_parameter_set(&mut self.vps, nal, "VPS")?;
                    continue;
                }
                nal_type::SPS => {
                    Self::cache_parameter_set(&mut self.sps, nal, "SPS")?;
                    continue;
                }
                nal_type::PPS => {
                    Self::cache_parameter_set(&mut self.pps, nal, "PPS")?;
                    continue;
                }
                _ if is_irap_nal_type(nal_type) => sample.is_key_frame = true,
                _ => {}
            }

            let offset = sample.data.len();
            sample
                .data
                .extend_from_slice(&(nal.len() as u32).to_be_bytes());
            sample.data.extend_from_slice(nal);

            // Two-byte NAL header in HEVC; same conservative slice-header
            // allowance as H.264.
            let clear_payload = if is_vcl_nal_type(nal_type) {
                nal.len().min(2 + VCL_CLEAR_LEAD)
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
