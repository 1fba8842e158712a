//! Muxer configuration: output layout, segmentation policy, and the
//! Common Encryption parameters.

use std::fmt;
use std::str::FromStr;

/// Options controlling segment layout and naming.
///
/// An empty `segment_template` selects single-file output: everything goes
/// into `output_file_name` with a `sidx` index covering the whole file.
/// A non-empty template selects multi-file output: `output_file_name`
/// receives the init segment (`ftyp|moov`) and each media segment is
/// written to the expanded template name.
#[derive(Debug, Clone)]
pub struct MuxerOptions {
    /// Init file in multi-file mode; the full file in single-file mode.
    pub output_file_name: String,
    /// Segment name pattern with `$Number$`/`$Time$`/`$Bandwidth$`/
    /// `$RepresentationID$` substitutions. Empty selects single-file mode.
    pub segment_template: String,
    /// Target segment length in seconds; cuts align to the next SAP.
    pub segment_duration_secs: f64,
    /// Target fragment length in seconds within a segment.
    pub fragment_duration_secs: f64,
    /// Require segments to begin on a stream access point.
    pub segment_sap_aligned: bool,
    /// Require fragments to begin on a stream access point.
    pub fragment_sap_aligned: bool,
    /// Negative disables `sidx`; zero emits one reference per fragment;
    /// positive N coalesces references into exactly N subsegments.
    pub num_subsegments_per_sidx: i32,
    /// Used for `$Bandwidth$` templating only; not validated.
    pub bandwidth: u32,
    /// Used for `$RepresentationID$` templating only.
    pub representation_id: String,
}

impl Default for MuxerOptions {
    fn default() -> Self {
        Self {
            output_file_name: String::new(),
            segment_template: String::new(),
            segment_duration_secs: 6.0,
            fragment_duration_secs: 2.0,
            segment_sap_aligned: true,
            fragment_sap_aligned: true,
            num_subsegments_per_sidx: 0,
            bandwidth: 0,
            representation_id: String::new(),
        }
    }
}

impl MuxerOptions {
    /// True when output is a single indexed file rather than one file per
    /// segment.
    pub fn single_file(&self) -> bool {
        self.segment_template.is_empty()
    }
}

/// The four CENC protection schemes from ISO/IEC 23001-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionScheme {
    /// AES-CTR, whole-subsample encryption.
    Cenc,
    /// AES-CTR with a crypt:skip block pattern.
    Cens,
    /// AES-CBC, whole-subsample encryption (block-aligned cipher spans).
    Cbc1,
    /// AES-CBC with a crypt:skip block pattern and constant IV.
    Cbcs,
}

impl ProtectionScheme {
    /// The scheme_type fourcc recorded in `schm`.
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            ProtectionScheme::Cenc => *b"cenc",
            ProtectionScheme::Cens => *b"cens",
            ProtectionScheme::Cbc1 => *b"cbc1",
            ProtectionScheme::Cbcs => *b"cbcs",
        }
    }

    /// True for the counter-mode schemes.
    pub fn uses_ctr(self) -> bool {
        matches!(self, ProtectionScheme::Cenc | ProtectionScheme::Cens)
    }

    /// True for the pattern-based schemes, which also require a constant
    /// IV.
    pub fn uses_pattern(self) -> bool {
        matches!(self, ProtectionScheme::Cens | ProtectionScheme::Cbcs)
    }

    /// Per-sample IV size recorded in `tenc`/`senc`. Pattern schemes use a
    /// constant IV, recorded once in `tenc`, so their per-sample size is 0.
    pub fn per_sample_iv_size(self) -> u8 {
        match self {
            ProtectionScheme::Cenc => 8,
            ProtectionScheme::Cbc1 => 16,
            ProtectionScheme::Cens | ProtectionScheme::Cbcs => 0,
        }
    }

    /// The IV length this scheme expects at configuration time.
    pub fn iv_size(self) -> usize {
        match self {
            ProtectionScheme::Cenc | ProtectionScheme::Cens => 8,
            ProtectionScheme::Cbc1 | ProtectionScheme::Cbcs => 16,
        }
    }
}

impl fmt::Display for ProtectionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fourcc = self.fourcc();
        // Fourccs are ASCII by construction.
        write!(f, "{}", std::str::from_utf8(&fourcc).unwrap_or("????"))
    }
}

impl FromStr for ProtectionScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cenc" => Ok(ProtectionScheme::Cenc),
            "cens" => Ok(ProtectionScheme::Cens),
            "cbc1" => Ok(ProtectionScheme::Cbc1),
            "cbcs" => Ok(ProtectionScheme::Cbcs),
            _ => Err(format!("unknown protection scheme: {}", s)),
        }
    }
}

/// One DRM system attachment: a `pssh` box is emitted in `moov` for each.
#[derive(Debug, Clone)]
pub struct ProtectionSystem {
    /// 16-byte DRM system identifier.
    pub system_id: [u8; 16],
    /// System-specific pssh payload, opaque to the segmenter.
    pub pssh_data: Vec<u8>,
}

/// Key material and scheme selection for Common Encryption.
#[derive(Debug, Clone)]
pub struct EncryptionParams {
    pub scheme: ProtectionScheme,
    /// Key identifier recorded in `tenc` and every `pssh`.
    pub key_id: [u8; 16],
    /// AES key; 16, 24 or 32 bytes.
    pub key: Vec<u8>,
    /// Initial IV. 8 bytes for CTR schemes, 16 for CBC schemes.
    pub iv: Vec<u8>,
    /// Encrypted blocks per pattern run. 0 for non-pattern schemes;
    /// the common deployment for `cbcs`/`cens` is 1.
    pub crypt_byte_block: u8,
    /// Skipped blocks per pattern run. 0 for non-pattern schemes; the
    /// common deployment is 9.
    pub skip_byte_block: u8,
    /// DRM systems to advertise via `pssh`.
    pub protection_systems: Vec<ProtectionSystem>,
    /// Samples with PTS inside this leading window are left in the clear.
    pub clear_lead_secs: f64,
}

impl EncryptionParams {
    /// A minimal `cenc` configuration with no DRM systems attached.
    pub fn cenc(key_id: [u8; 16], key: Vec<u8>, iv: Vec<u8>) -> Self {
        Self {
            scheme: ProtectionScheme::Cenc,
            key_id,
            key,
            iv,
            crypt_byte_block: 0,
            skip_byte_block: 0,
            protection_systems: Vec::new(),
            clear_lead_secs: 0.0,
        }
    }
}
