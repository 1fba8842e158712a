//! Byte-exact ISO-BMFF box serialization.
//!
//! Boxes are built bottom-up as `Vec<u8>` payloads: children serialize
//! first, parents prepend `size | fourcc` afterwards, so every size field
//! is exact by construction. Field widths follow ISO/IEC 14496-12; the
//! CENC boxes (`tenc`, `saiz`, `saio`, `senc`, `pssh`) follow
//! ISO/IEC 23001-7.

use crate::assert_invariant;
use crate::codec::VideoCodec;
use crate::config::{ProtectionScheme, ProtectionSystem};
use crate::crypto::sample::DecryptConfig;

/// Movie-level timescale used by `mvhd`; track media use their own
/// timescale from the track configuration.
pub const MOVIE_TIMESCALE: u32 = 1000;

/// SAP type value meaning "unknown" in a `sidx` reference.
pub const SAP_TYPE_UNKNOWN: u8 = 0;

/// Append-only big-endian byte sink used to assemble output files.
#[derive(Debug, Default)]
pub struct BufferWriter {
    buf: Vec<u8>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Wrap a payload in a plain box header.
pub fn build_box(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let size = (8 + payload.len()) as u32;
    let mut buf = Vec::with_capacity(size as usize);
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(typ);
    buf.extend_from_slice(payload);
    buf
}

/// Wrap a payload in a full-box header (version + 24-bit flags).
pub fn build_full_box(typ: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    assert_invariant!(
        flags <= 0x00ff_ffff,
        "full-box flags must fit in 24 bits",
        "boxes::build_full_box"
    );
    let mut full = Vec::with_capacity(4 + payload.len());
    full.extend_from_slice(&((u32::from(version) << 24) | flags).to_be_bytes());
    full.extend_from_slice(payload);
    build_box(typ, &full)
}

// ============================================================================
// File-level boxes
// ============================================================================

/// `ftyp` carrying the DASH brands plus the codec-specific brand per track.
pub fn build_ftyp(codecs: &[VideoCodec]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(b"iso6"); // major brand
    payload.extend_from_slice(&0u32.to_be_bytes()); // minor version
    payload.extend_from_slice(b"iso6");
    payload.extend_from_slice(b"dash");
    for codec in codecs {
        payload.extend_from_slice(&codec.sample_entry_fourcc());
    }
    build_box(b"ftyp", &payload)
}

/// `styp` for media segment files.
pub fn build_styp() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(b"msdh"); // major brand
    payload.extend_from_slice(&0u32.to_be_bytes());
    payload.extend_from_slice(b"msdh");
    payload.extend_from_slice(b"msix");
    payload.extend_from_slice(b"iso6");
    payload.extend_from_slice(b"dash");
    build_box(b"styp", &payload)
}

/// Per-track data needed to serialize `moov`.
pub struct TrackInit {
    pub track_id: u32,
    pub codec: VideoCodec,
    pub timescale: u32,
    pub width: u32,
    pub height: u32,
    pub language: Option<String>,
    /// Serialized `avcC`/`hvcC` payload from the bitstream converter.
    pub decoder_config_record: Vec<u8>,
    /// Protection wrapping, present when the track is encrypted.
    pub protection: Option<TrackProtection>,
}

/// Sample-entry protection parameters backing `sinf`/`tenc`.
pub struct TrackProtection {
    pub scheme: ProtectionScheme,
    pub key_id: [u8; 16],
    /// Constant IV for pattern schemes (per-sample IV size 0).
    pub constant_iv: Option<Vec<u8>>,
    pub crypt_byte_block: u8,
    pub skip_byte_block: u8,
}

/// `moov` for fragmented output: `mvhd` + one `trak` per track + `mvex`
/// with a `trex` per track + any `pssh` boxes.
pub fn build_moov(tracks: &[TrackInit], protection_systems: &[ProtectionSystem]) -> Vec<u8> {
    let next_track_id = tracks.iter().map(|t| t.track_id).max().unwrap_or(0) + 1;

    let mut payload = build_mvhd(next_track_id);
    for track in tracks {
        payload.extend_from_slice(&build_trak(track));
    }

    let mut mvex = Vec::new();
    for track in tracks {
        mvex.extend_from_slice(&build_trex(track.track_id));
    }
    payload.extend_from_slice(&build_box(b"mvex", &mvex));

    for system in protection_systems {
        payload.extend_from_slice(&build_pssh(system));
    }

    build_box(b"moov", &payload)
}

fn build_mvhd(next_track_id: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u32.to_be_bytes()); // creation time
    payload.extend_from_slice(&0u32.to_be_bytes()); // modification time
    payload.extend_from_slice(&MOVIE_TIMESCALE.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes()); // duration unknown (live/fragmented)
    payload.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    payload.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    payload.extend_from_slice(&[0u8; 10]); // reserved
    payload.extend_from_slice(&unity_matrix());
    payload.extend_from_slice(&[0u8; 24]); // pre-defined
    payload.extend_from_slice(&next_track_id.to_be_bytes());
    build_full_box(b"mvhd", 0, 0, &payload)
}

fn unity_matrix() -> [u8; 36] {
    let mut matrix = [0u8; 36];
    matrix[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    matrix[16..20].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    matrix[32..36].copy_from_slice(&0x4000_0000u32.to_be_bytes());
    matrix
}

fn build_trex(track_id: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&track_id.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes()); // default sample description index
    payload.extend_from_slice(&0u32.to_be_bytes()); // default sample duration
    payload.extend_from_slice(&0u32.to_be_bytes()); // default sample size
    payload.extend_from_slice(&0u32.to_be_bytes()); // default sample flags
    build_full_box(b"trex", 0, 0, &payload)
}

fn build_trak(track: &TrackInit) -> Vec<u8> {
    let mut payload = build_tkhd(track);
    payload.extend_from_slice(&build_mdia(track));
    build_box(b"trak", &payload)
}

fn build_tkhd(track: &TrackInit) -> Vec<u8> {
    assert_invariant!(
        track.width <= u16::MAX as u32 && track.height <= u16::MAX as u32,
        "track dimensions must fit the visual sample entry",
        "boxes::build_tkhd"
    );
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u32.to_be_bytes()); // creation time
    payload.extend_from_slice(&0u32.to_be_bytes()); // modification time
    payload.extend_from_slice(&track.track_id.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes()); // reserved
    payload.extend_from_slice(&0u32.to_be_bytes()); // duration
    payload.extend_from_slice(&[0u8; 8]); // reserved
    payload.extend_from_slice(&0u16.to_be_bytes()); // layer
    payload.extend_from_slice(&0u16.to_be_bytes()); // alternate group
    payload.extend_from_slice(&0u16.to_be_bytes()); // volume (video)
    payload.extend_from_slice(&0u16.to_be_bytes()); // reserved
    payload.extend_from_slice(&unity_matrix());
    // 16.16 fixed point
    payload.extend_from_slice(&(track.width << 16).to_be_bytes());
    payload.extend_from_slice(&(track.height << 16).to_be_bytes());
    // flags: enabled + in_movie
    build_full_box(b"tkhd", 0, 0x000003, &payload)
}

fn build_mdia(track: &TrackInit) -> Vec<u8> {
    let mut payload = build_mdhd(track.timescale, track.language.as_deref());
    payload.extend_from_slice(&build_hdlr());
    payload.extend_from_slice(&build_minf(track));
    build_box(b"mdia", &payload)
}

/// ISO 639-2/T codes pack into 16 bits as three 5-bit letters offset by
/// 0x60.
fn encode_language_code(language: &str) -> [u8; 2] {
    let chars: Vec<char> = language.chars().take(3).collect();
    let c1 = chars.first().copied().unwrap_or('u') as u16;
    let c2 = chars.get(1).copied().unwrap_or('n') as u16;
    let c3 = chars.get(2).copied().unwrap_or('d') as u16;

    let packed = ((c1.saturating_sub(0x60) & 0x1f) << 10)
        | ((c2.saturating_sub(0x60) & 0x1f) << 5)
        | (c3.saturating_sub(0x60) & 0x1f);
    packed.to_be_bytes()
}

fn build_mdhd(timescale: u32, language: Option<&str>) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u32.to_be_bytes()); // creation time
    payload.extend_from_slice(&0u32.to_be_bytes()); // modification time
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes()); // duration unknown
    payload.extend_from_slice(&encode_language_code(language.unwrap_or("und")));
    payload.extend_from_slice(&0u16.to_be_bytes()); // pre-defined
    build_full_box(b"mdhd", 0, 0, &payload)
}

fn build_hdlr() -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u32.to_be_bytes()); // pre-defined
    payload.extend_from_slice(b"vide");
    payload.extend_from_slice(&[0u8; 12]); // reserved
    payload.extend_from_slice(b"VideoHandler\0");
    build_full_box(b"hdlr", 0, 0, &payload)
}

fn build_minf(track: &TrackInit) -> Vec<u8> {
    let mut payload = build_vmhd();
    payload.extend_from_slice(&build_dinf());
    payload.extend_from_slice(&build_stbl(track));
    build_box(b"minf", &payload)
}

fn build_vmhd() -> Vec<u8> {
    build_full_box(b"vmhd", 0, 1, &[0u8; 8]) // graphics mode + op color
}

fn build_dinf() -> Vec<u8> {
    let url = build_full_box(b"url ", 0, 1, &[]); // self-contained
    let mut dref_payload = Vec::new();
    dref_payload.extend_from_slice(&1u32.to_be_bytes()); // entry count
    dref_payload.extend_from_slice(&url);
    let dref = build_full_box(b"dref", 0, 0, &dref_payload);
    build_box(b"dinf", &dref)
}

/// Minimal `stbl` for fragmented output: real sample tables live in the
/// fragments.
fn build_stbl(track: &TrackInit) -> Vec<u8> {
    let mut stsd_payload = Vec::new();
    stsd_payload.extend_from_slice(&1u32.to_be_bytes()); // entry count
    stsd_payload.extend_from_slice(&build_visual_sample_entry(track));
    let mut payload = build_full_box(b"stsd", 0, 0, &stsd_payload);

    // Empty stts/stsc/stsz/stco.
    payload.extend_from_slice(&build_full_box(b"stts", 0, 0, &0u32.to_be_bytes()));
    payload.extend_from_slice(&build_full_box(b"stsc", 0, 0, &0u32.to_be_bytes()));
    let mut stsz = Vec::new();
    stsz.extend_from_slice(&0u32.to_be_bytes()); // sample size (variable)
    stsz.extend_from_slice(&0u32.to_be_bytes()); // sample count
    payload.extend_from_slice(&build_full_box(b"stsz", 0, 0, &stsz));
    payload.extend_from_slice(&build_full_box(b"stco", 0, 0, &0u32.to_be_bytes()));

    build_box(b"stbl", &payload)
}

/// `avc1`/`hvc1` visual sample entry, wrapped as `encv` + `sinf` when the
/// track is protected.
fn build_visual_sample_entry(track: &TrackInit) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&[0u8; 6]); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // data reference index
    payload.extend_from_slice(&0u16.to_be_bytes()); // pre-defined
    payload.extend_from_slice(&0u16.to_be_bytes()); // reserved
    payload.extend_from_slice(&[0u8; 12]); // pre-defined
    payload.extend_from_slice(&(track.width as u16).to_be_bytes());
    payload.extend_from_slice(&(track.height as u16).to_be_bytes());
    payload.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // 72 dpi
    payload.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes()); // reserved
    payload.extend_from_slice(&1u16.to_be_bytes()); // frame count
    payload.extend_from_slice(&[0u8; 32]); // compressor name
    payload.extend_from_slice(&0x0018u16.to_be_bytes()); // depth
    payload.extend_from_slice(&0xffffu16.to_be_bytes()); // pre-defined

    payload.extend_from_slice(&build_box(
        &track.codec.config_box_fourcc(),
        &track.decoder_config_record,
    ));

    match &track.protection {
        None => build_box(&track.codec.sample_entry_fourcc(), &payload),
        Some(protection) => {
            payload.extend_from_slice(&build_sinf(track.codec, protection));
            build_box(b"encv", &payload)
        }
    }
}

fn build_sinf(codec: VideoCodec, protection: &TrackProtection) -> Vec<u8> {
    let frma = build_box(b"frma", &codec.sample_entry_fourcc());

    let mut schm_payload = Vec::new();
    schm_payload.extend_from_slice(&protection.scheme.fourcc());
    schm_payload.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // scheme version 1.0
    let schm = build_full_box(b"schm", 0, 0, &schm_payload);

    let schi = build_box(b"schi", &build_tenc(protection));

    let mut payload = frma;
    payload.extend_from_slice(&schm);
    payload.extend_from_slice(&schi);
    build_box(b"sinf", &payload)
}

/// `tenc` per ISO/IEC 23001-7 §8.2; version 1 carries the pattern pair.
fn build_tenc(protection: &TrackProtection) -> Vec<u8> {
    let version = if protection.scheme.uses_pattern() { 1 } else { 0 };
    let per_sample_iv_size = protection.scheme.per_sample_iv_size();

    let mut payload = Vec::new();
    payload.push(0); // reserved
    if version == 0 {
        payload.push(0); // reserved
    } else {
        payload.push((protection.crypt_byte_block << 4) | (protection.skip_byte_block & 0x0f));
    }
    payload.push(1); // default_isProtected
    payload.push(per_sample_iv_size);
    payload.extend_from_slice(&protection.key_id);
    if per_sample_iv_size == 0 {
        let constant_iv = protection.constant_iv.as_deref().unwrap_or(&[]);
        assert_invariant!(
            !constant_iv.is_empty(),
            "constant-IV schemes must record the IV in tenc",
            "boxes::build_tenc"
        );
        payload.push(constant_iv.len() as u8);
        payload.extend_from_slice(constant_iv);
    }
    build_full_box(b"tenc", version, 0, &payload)
}

/// `pssh` version 0 with system-specific payload.
fn build_pssh(system: &ProtectionSystem) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&system.system_id);
    payload.extend_from_slice(&(system.pssh_data.len() as u32).to_be_bytes());
    payload.extend_from_slice(&system.pssh_data);
    build_full_box(b"pssh", 0, 0, &payload)
}

// ============================================================================
// Fragment-level boxes
// ============================================================================

/// Per-sample record feeding one `trun` entry.
#[derive(Debug, Clone, Copy)]
pub struct SampleRecord {
    pub size: u32,
    pub duration: u32,
    /// Sample flags per ISO/IEC 14496-12 §8.8.3.1.
    pub flags: u32,
    /// Composition time offset (pts - dts), signed (trun version 1).
    pub cts_offset: i32,
}

/// Sample flags for a sync sample: sample_depends_on = 2.
pub const SAMPLE_FLAGS_SYNC: u32 = 0x0200_0000;
/// Sample flags for a non-sync sample: depends_on = 1 + non_sync bit.
pub const SAMPLE_FLAGS_NON_SYNC: u32 = 0x0101_0000;

pub fn build_mfhd(sequence_number: u32) -> Vec<u8> {
    build_full_box(b"mfhd", 0, 0, &sequence_number.to_be_bytes())
}

/// `tfhd` with `default-base-is-moof` and an explicit sample description
/// index.
pub fn build_tfhd(track_id: u32) -> Vec<u8> {
    // 0x020000 = default-base-is-moof, 0x000002 = sample-description-index
    let flags = 0x020000 | 0x000002;
    let mut payload = Vec::new();
    payload.extend_from_slice(&track_id.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes()); // sample description index
    build_full_box(b"tfhd", 0, flags, &payload)
}

/// `tfdt` version 1 (64-bit base media decode time).
pub fn build_tfdt(base_media_decode_time: u64) -> Vec<u8> {
    build_full_box(b"tfdt", 1, 0, &base_media_decode_time.to_be_bytes())
}

/// `trun` version 1 with data offset and per-sample
/// duration/size/flags/composition offsets.
pub fn build_trun(samples: &[SampleRecord], data_offset: i32) -> Vec<u8> {
    // data-offset | duration | size | flags | composition-time-offset
    let flags: u32 = 0x000001 | 0x000100 | 0x000200 | 0x000400 | 0x000800;

    let mut payload = Vec::new();
    payload.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    payload.extend_from_slice(&data_offset.to_be_bytes());
    for sample in samples {
        payload.extend_from_slice(&sample.duration.to_be_bytes());
        payload.extend_from_slice(&sample.size.to_be_bytes());
        payload.extend_from_slice(&sample.flags.to_be_bytes());
        payload.extend_from_slice(&sample.cts_offset.to_be_bytes());
    }
    build_full_box(b"trun", 1, flags, &payload)
}

/// `saiz`: per-sample auxiliary info sizes, collapsed to the default when
/// uniform.
pub fn build_saiz(aux_sizes: &[u32]) -> Vec<u8> {
    let uniform = aux_sizes
        .windows(2)
        .all(|pair| pair[0] == pair[1]);
    let default_size = if uniform {
        aux_sizes.first().copied().unwrap_or(0)
    } else {
        0
    };
    assert_invariant!(
        aux_sizes.iter().all(|&size| size <= u8::MAX as u32),
        "auxiliary info entries must fit in one byte",
        "boxes::build_saiz"
    );

    let mut payload = Vec::new();
    payload.push(default_size as u8);
    payload.extend_from_slice(&(aux_sizes.len() as u32).to_be_bytes());
    if !uniform {
        for &size in aux_sizes {
            payload.push(size as u8);
        }
    }
    build_full_box(b"saiz", 0, 0, &payload)
}

/// `saio` with a single offset entry (auxiliary data is contiguous in
/// `senc`).
pub fn build_saio(offset: u32) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&1u32.to_be_bytes()); // entry count
    payload.extend_from_slice(&offset.to_be_bytes());
    build_full_box(b"saio", 0, 0, &payload)
}

/// `senc` carrying per-sample IVs and subsample tables.
///
/// `per_sample_iv_size` of zero (constant-IV schemes) writes no IV bytes.
pub fn build_senc(configs: &[DecryptConfig], per_sample_iv_size: u8) -> Vec<u8> {
    // 0x2 = subsample information present
    let flags = 0x000002u32;
    let mut payload = Vec::new();
    payload.extend_from_slice(&(configs.len() as u32).to_be_bytes());
    for config in configs {
        if per_sample_iv_size > 0 {
            assert_invariant!(
                config.iv.len() == per_sample_iv_size as usize,
                "senc IV entries must match the per-sample IV size",
                "boxes::build_senc"
            );
            payload.extend_from_slice(&config.iv);
        }
        payload.extend_from_slice(&(config.subsamples.len() as u16).to_be_bytes());
        for subsample in &config.subsamples {
            payload.extend_from_slice(&subsample.clear_bytes.to_be_bytes());
            payload.extend_from_slice(&subsample.cipher_bytes.to_be_bytes());
        }
    }
    build_full_box(b"senc", 0, flags, &payload)
}

/// Offset of the first auxiliary-information byte inside a serialized
/// `senc` box (header + version/flags + sample_count).
pub const SENC_DATA_POS: usize = 8 + 4 + 4;

// ============================================================================
// Segment index
// ============================================================================

/// One `sidx` reference; pre-coalescing these map 1:1 onto fragments.
#[derive(Debug, Clone, Copy)]
pub struct SegmentReference {
    pub referenced_size: u32,
    pub subsegment_duration: u32,
    pub earliest_presentation_time: u64,
    /// 0 = unknown, 1-6 per ISO/IEC 14496-12 Annex I.
    pub sap_type: u8,
    pub sap_delta_time: u32,
}

/// `sidx` version 1 (64-bit earliest presentation time / first offset).
pub fn build_sidx(
    reference_id: u32,
    timescale: u32,
    earliest_presentation_time: u64,
    first_offset: u64,
    references: &[SegmentReference],
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&reference_id.to_be_bytes());
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&earliest_presentation_time.to_be_bytes());
    payload.extend_from_slice(&first_offset.to_be_bytes());
    payload.extend_from_slice(&0u16.to_be_bytes()); // reserved
    payload.extend_from_slice(&(references.len() as u16).to_be_bytes());
    for reference in references {
        assert_invariant!(
            reference.referenced_size <= 0x7fff_ffff,
            "sidx referenced_size must fit in 31 bits",
            "boxes::build_sidx"
        );
        // reference_type (0 = media) | referenced_size
        payload.extend_from_slice(&reference.referenced_size.to_be_bytes());
        payload.extend_from_slice(&reference.subsegment_duration.to_be_bytes());
        let starts_with_sap = u32::from(reference.sap_type != SAP_TYPE_UNKNOWN);
        let sap_word = (starts_with_sap << 31)
            | (u32::from(reference.sap_type & 0x07) << 28)
            | (reference.sap_delta_time & 0x0fff_ffff);
        payload.extend_from_slice(&sap_word.to_be_bytes());
    }
    build_full_box(b"sidx", 1, 0, &payload)
}

/// `mdat` header for a payload of the given size.
pub fn build_mdat_header(payload_size: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(8);
    header.extend_from_slice(&((8 + payload_size) as u32).to_be_bytes());
    header.extend_from_slice(b"mdat");
    header
}

/// `moof` assembled from pre-built `traf` boxes.
pub fn build_moof(sequence_number: u32, trafs: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = build_mfhd(sequence_number);
    for traf in trafs {
        payload.extend_from_slice(traf);
    }
    build_box(b"moof", &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sample::SubsampleEntry;

    fn box_type(data: &[u8]) -> &[u8] {
        &data[4..8]
    }

    fn box_size(data: &[u8]) -> usize {
        u32::from_be_bytes(data[0..4].try_into().unwrap()) as usize
    }

    #[test]
    fn box_size_covers_header_and_payload() {
        let payload = [1u8, 2, 3];
        let boxed = build_box(b"free", &payload);
        assert_eq!(box_size(&boxed), 11);
        assert_eq!(box_type(&boxed), b"free");
        assert_eq!(&boxed[8..], &payload);
    }

    #[test]
    fn full_box_packs_version_and_flags() {
        let boxed = build_full_box(b"tfdt", 1, 0x000002, &[]);
        assert_eq!(boxed[8], 1); // version
        assert_eq!(&boxed[9..12], &[0, 0, 2]); // flags
    }

    #[test]
    fn ftyp_carries_dash_and_codec_brands() {
        let ftyp = build_ftyp(&[VideoCodec::H264]);
        assert_eq!(box_type(&ftyp), b"ftyp");
        let payload = &ftyp[8..];
        assert_eq!(&payload[0..4], b"iso6");
        assert!(payload.windows(4).any(|w| w == b"dash"));
        assert!(payload.windows(4).any(|w| w == b"avc1"));
    }

    #[test]
    fn styp_uses_media_segment_brands() {
        let styp = build_styp();
        assert_eq!(box_type(&styp), b"styp");
        assert!(styp.windows(4).any(|w| w == b"msix"));
    }

    #[test]
    fn trun_entry_layout() {
        let samples = [SampleRecord {
            size: 1000,
            duration: 3000,
            flags: SAMPLE_FLAGS_SYNC,
            cts_offset: -500,
        }];
        let trun = build_trun(&samples, 0x1234);
        // header(8) + version/flags(4) + count(4) + data_offset(4)
        assert_eq!(trun[8], 1); // version 1 for signed cts
        let count = u32::from_be_bytes(trun[12..16].try_into().unwrap());
        assert_eq!(count, 1);
        let offset = i32::from_be_bytes(trun[16..20].try_into().unwrap());
        assert_eq!(offset, 0x1234);
        let duration = u32::from_be_bytes(trun[20..24].try_into().unwrap());
        assert_eq!(duration, 3000);
        let cts = i32::from_be_bytes(trun[32..36].try_into().unwrap());
        assert_eq!(cts, -500);
    }

    #[test]
    fn saiz_collapses_uniform_sizes() {
        let saiz = build_saiz(&[22, 22, 22]);
        // header(8) + version/flags(4): default_size, then count
        assert_eq!(saiz[12], 22);
        let count = u32::from_be_bytes(saiz[13..17].try_into().unwrap());
        assert_eq!(count, 3);
        assert_eq!(saiz.len(), 17); // no per-sample table

        let varying = build_saiz(&[20, 26]);
        assert_eq!(varying[12], 0);
        assert_eq!(&varying[17..19], &[20, 26]);
    }

    #[test]
    fn senc_layout_with_ivs_and_subsamples() {
        let configs = [DecryptConfig {
            key_id: [0; 16],
            iv: vec![0xab; 8],
            subsamples: vec![SubsampleEntry::new(9, 91)],
            protection_scheme: ProtectionScheme::Cenc,
            crypt_byte_block: 0,
            skip_byte_block: 0,
        }];
        let senc = build_senc(&configs, 8);
        assert_eq!(box_type(&senc), b"senc");
        assert_eq!(&senc[9..12], &[0, 0, 2]); // subsample flag
        let sample_count = u32::from_be_bytes(senc[12..16].try_into().unwrap());
        assert_eq!(sample_count, 1);
        assert_eq!(&senc[SENC_DATA_POS..SENC_DATA_POS + 8], &[0xab; 8]);
        let subsample_count =
            u16::from_be_bytes(senc[24..26].try_into().unwrap());
        assert_eq!(subsample_count, 1);
        let clear = u16::from_be_bytes(senc[26..28].try_into().unwrap());
        let cipher = u32::from_be_bytes(senc[28..32].try_into().unwrap());
        assert_eq!((clear, cipher), (9, 91));
    }

    #[test]
    fn tenc_version_0_for_cenc() {
        let protection = TrackProtection {
            scheme: ProtectionScheme::Cenc,
            key_id: [0x42; 16],
            constant_iv: None,
            crypt_byte_block: 0,
            skip_byte_block: 0,
        };
        let tenc = build_tenc(&protection);
        assert_eq!(tenc[8], 0); // version
        let payload = &tenc[12..];
        assert_eq!(payload[2], 1); // default_isProtected
        assert_eq!(payload[3], 8); // per-sample IV size
        assert_eq!(&payload[4..20], &[0x42; 16]);
        assert_eq!(payload.len(), 20);
    }

    #[test]
    fn tenc_version_1_records_pattern_and_constant_iv() {
        let protection = TrackProtection {
            scheme: ProtectionScheme::Cbcs,
            key_id: [0x10; 16],
            constant_iv: Some(vec![0xcd; 16]),
            crypt_byte_block: 1,
            skip_byte_block: 9,
        };
        let tenc = build_tenc(&protection);
        assert_eq!(tenc[8], 1); // version
        let payload = &tenc[12..];
        assert_eq!(payload[1], 0x19); // crypt 1 : skip 9
        assert_eq!(payload[3], 0); // constant IV scheme
        assert_eq!(payload[20], 16); // constant IV size
        assert_eq!(&payload[21..37], &[0xcd; 16]);
    }

    #[test]
    fn sidx_reference_packing() {
        let references = [SegmentReference {
            referenced_size: 4096,
            subsegment_duration: 90000,
            earliest_presentation_time: 180000,
            sap_type: 1,
            sap_delta_time: 0,
        }];
        let sidx = build_sidx(1, 90000, 180000, 0, &references);
        assert_eq!(sidx[8], 1); // version 1
        let payload = &sidx[12..];
        let reference_id = u32::from_be_bytes(payload[0..4].try_into().unwrap());
        assert_eq!(reference_id, 1);
        let ept = u64::from_be_bytes(payload[8..16].try_into().unwrap());
        assert_eq!(ept, 180000);
        let count = u16::from_be_bytes(payload[26..28].try_into().unwrap());
        assert_eq!(count, 1);
        let sap_word = u32::from_be_bytes(payload[36..40].try_into().unwrap());
        assert_eq!(sap_word >> 31, 1); // starts_with_sap
        assert_eq!((sap_word >> 28) & 0x7, 1); // sap_type
    }

    #[test]
    fn sidx_unknown_sap_clears_sap_word() {
        let references = [SegmentReference {
            referenced_size: 100,
            subsegment_duration: 100,
            earliest_presentation_time: 0,
            sap_type: SAP_TYPE_UNKNOWN,
            sap_delta_time: 0,
        }];
        let sidx = build_sidx(1, 90000, 0, 0, &references);
        let payload = &sidx[12..];
        let sap_word = u32::from_be_bytes(payload[36..40].try_into().unwrap());
        assert_eq!(sap_word, 0);
    }

    #[test]
    fn moov_contains_mvex_with_trex_per_track() {
        let tracks = [
            TrackInit {
                track_id: 1,
                codec: VideoCodec::H264,
                timescale: 90000,
                width: 1280,
                height: 720,
                language: None,
                decoder_config_record: vec![1, 0x64, 0, 0x1f],
                protection: None,
            },
            TrackInit {
                track_id: 2,
                codec: VideoCodec::H264,
                timescale: 90000,
                width: 640,
                height: 360,
                language: Some("eng".into()),
                decoder_config_record: vec![1, 0x42, 0, 0x1e],
                protection: None,
            },
        ];
        let moov = build_moov(&tracks, &[]);
        assert_eq!(box_type(&moov), b"moov");
        let trak_count = moov.windows(4).filter(|w| w == b"trak").count();
        assert_eq!(trak_count, 2);
        let trex_count = moov.windows(4).filter(|w| w == b"trex").count();
        assert_eq!(trex_count, 2);
        assert!(moov.windows(4).any(|w| w == b"avcC"));
    }

    #[test]
    fn encrypted_track_wraps_sample_entry_in_encv_sinf() {
        let track = TrackInit {
            track_id: 1,
            codec: VideoCodec::H264,
            timescale: 90000,
            width: 1280,
            height: 720,
            language: None,
            decoder_config_record: vec![1, 0x64, 0, 0x1f],
            protection: Some(TrackProtection {
                scheme: ProtectionScheme::Cenc,
                key_id: [7; 16],
                constant_iv: None,
                crypt_byte_block: 0,
                skip_byte_block: 0,
            }),
        };
        let moov = build_moov(std::slice::from_ref(&track), &[]);
        for fourcc in [b"encv", b"sinf", b"frma", b"schm", b"tenc"] {
            assert!(
                moov.windows(4).any(|w| w == *fourcc),
                "missing {:?}",
                std::str::from_utf8(fourcc)
            );
        }
    }

    #[test]
    fn pssh_carries_system_id_and_data() {
        let system = ProtectionSystem {
            system_id: [0xed; 16],
            pssh_data: vec![1, 2, 3, 4],
        };
        let pssh = build_pssh(&system);
        assert_eq!(box_type(&pssh), b"pssh");
        assert_eq!(&pssh[12..28], &[0xed; 16]);
        let data_size = u32::from_be_bytes(pssh[28..32].try_into().unwrap());
        assert_eq!(data_size, 4);
    }

    #[test]
    fn mdat_header_size_includes_header() {
        let header = build_mdat_header(100);
        assert_eq!(box_size(&header), 108);
        assert_eq!(box_type(&header), b"mdat");
    }

    #[test]
    fn tfhd_sets_default_base_is_moof() {
        let tfhd = build_tfhd(3);
        let version_flags = u32::from_be_bytes(tfhd[8..12].try_into().unwrap());
        assert_eq!(version_flags & 0x020000, 0x020000);
        assert_eq!(version_flags & 0x000002, 0x000002);
        let track_id = u32::from_be_bytes(tfhd[12..16].try_into().unwrap());
        assert_eq!(track_id, 3);
    }
}
