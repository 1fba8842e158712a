//! Input validation for packaging configurations.
//!
//! Two layers: hard `check_*` functions used by the builder (returning
//! [`crate::error::Error`]), and a [`ValidationResult`] report used by the
//! CLI's dry-run mode to show everything wrong at once.

use crate::api::TrackConfig;
use crate::config::{EncryptionParams, MuxerOptions};
use crate::error::{Error, Result};
use crate::segmenter::split_format;

/// Result of a dry-run validation pass.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationResult {
    /// Whether the configuration can be packaged.
    pub is_valid: bool,
    /// Human-readable confirmations.
    pub messages: Vec<String>,
    /// Detailed error descriptions when invalid.
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            messages: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: String) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.errors.push(error);
        self.is_valid = false;
        self
    }

    fn absorb(&mut self, result: Result<()>, ok_message: &str) {
        match result {
            Ok(()) => self.messages.push(format!("✓ {}", ok_message)),
            Err(err) => {
                self.is_valid = false;
                self.errors.push(err.to_string());
            }
        }
    }
}

/// Hard validation of the muxer options.
pub fn check_options(options: &MuxerOptions) -> Result<()> {
    if options.output_file_name.is_empty() {
        return Err(Error::invalid_argument("output_file_name must be set"));
    }
    if options.segment_duration_secs <= 0.0 || !options.segment_duration_secs.is_finite() {
        return Err(Error::invalid_argument(
            "segment_duration_secs must be positive and finite",
        ));
    }
    if options.fragment_duration_secs <= 0.0 || !options.fragment_duration_secs.is_finite() {
        return Err(Error::invalid_argument(
            "fragment_duration_secs must be positive and finite",
        ));
    }
    if !options.segment_template.is_empty() {
        check_segment_template(&options.segment_template)?;
    }
    Ok(())
}

/// Validate a segment name template without expanding it.
///
/// A usable template names each segment uniquely, so it must contain
/// `$Number$` or `$Time$`; identifiers and width formats must parse.
pub fn check_segment_template(template: &str) -> Result<()> {
    let mut has_number_or_time = false;
    let mut rest = template;
    while let Some(start) = rest.find('$') {
        let after = &rest[start + 1..];
        let end = after.find('$').ok_or_else(|| {
            Error::invalid_argument(format!("unterminated identifier in template: {}", template))
        })?;
        let identifier = &after[..end];
        rest = &after[end + 1..];
        if identifier.is_empty() {
            continue; // $$ escape
        }
        let (name, width) = split_format(identifier)?;
        match name {
            "Number" | "Time" => has_number_or_time = true,
            "Bandwidth" => {}
            "RepresentationID" => {
                if width.is_some() {
                    return Err(Error::invalid_argument(
                        "$RepresentationID$ does not take a width format",
                    ));
                }
            }
            other => {
                return Err(Error::invalid_argument(format!(
                    "unknown template identifier ${}$",
                    other
                )))
            }
        }
    }
    if !has_number_or_time {
        return Err(Error::invalid_argument(
            "segment template must contain $Number$ or $Time$",
        ));
    }
    Ok(())
}

/// Hard validation of the track set.
pub fn check_tracks(tracks: &[TrackConfig]) -> Result<()> {
    if tracks.is_empty() {
        return Err(Error::invalid_argument("at least one track is required"));
    }
    let mut seen_ids = std::collections::HashSet::new();
    for track in tracks {
        if track.track_id == 0 {
            return Err(Error::invalid_argument("track_id 0 is reserved"));
        }
        if !seen_ids.insert(track.track_id) {
            return Err(Error::invalid_argument(format!(
                "duplicate track_id {}",
                track.track_id
            )));
        }
        if track.timescale == 0 {
            return Err(Error::invalid_argument(format!(
                "track {}: timescale must be positive",
                track.track_id
            )));
        }
        if track.width == 0
            || track.height == 0
            || track.width > u16::MAX as u32
            || track.height > u16::MAX as u32
        {
            return Err(Error::invalid_argument(format!(
                "track {}: dimensions {}x{} out of range",
                track.track_id, track.width, track.height
            )));
        }
    }
    Ok(())
}

/// Hard validation of encryption parameters, mirroring what the sample
/// encryptor enforces so problems surface before any bytes are written.
pub fn check_encryption(params: &EncryptionParams) -> Result<()> {
    match params.key.len() {
        16 | 24 | 32 => {}
        other => {
            return Err(Error::invalid_argument(format!(
                "invalid AES key size: {} bytes",
                other
            )))
        }
    }
    if params.iv.len() != params.scheme.iv_size() {
        return Err(Error::invalid_argument(format!(
            "{} requires a {}-byte IV, got {}",
            params.scheme,
            params.scheme.iv_size(),
            params.iv.len()
        )));
    }
    if params.scheme.uses_pattern() {
        if params.crypt_byte_block == 0 {
            return Err(Error::invalid_argument(format!(
                "{} requires crypt_byte_block > 0",
                params.scheme
            )));
        }
        if params.crypt_byte_block > 15 || params.skip_byte_block > 15 {
            return Err(Error::invalid_argument(
                "pattern blocks must fit in 4 bits (0-15)",
            ));
        }
    } else if params.crypt_byte_block != 0 || params.skip_byte_block != 0 {
        return Err(Error::invalid_argument(format!(
            "{} does not use pattern encryption",
            params.scheme
        )));
    }
    if params.clear_lead_secs < 0.0 || !params.clear_lead_secs.is_finite() {
        return Err(Error::invalid_argument(
            "clear_lead_secs must be non-negative and finite",
        ));
    }
    Ok(())
}

/// Dry-run validation of a complete packaging configuration.
pub fn validate_packaging_config(
    options: &MuxerOptions,
    tracks: &[TrackConfig],
    encryption: Option<&EncryptionParams>,
) -> ValidationResult {
    let mut result = ValidationResult::valid();
    result.absorb(check_options(options), "output options are valid");
    result.absorb(check_tracks(tracks), "track configuration is valid");
    if let Some(params) = encryption {
        result.absorb(check_encryption(params), "encryption parameters are valid");
        result = result.with_message(format!("✓ protection scheme: {}", params.scheme));
    } else {
        result = result.with_message("✓ no encryption configured".to_string());
    }
    if options.single_file() {
        result.with_message("✓ single-file output with sidx index".to_string())
    } else {
        result.with_message(format!(
            "✓ multi-file output via template {}",
            options.segment_template
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::VideoCodec;
    use crate::config::ProtectionScheme;

    fn options() -> MuxerOptions {
        MuxerOptions {
            output_file_name: "init.mp4".into(),
            segment_template: "seg_$Number$.m4s".into(),
            ..Default::default()
        }
    }

    fn track() -> TrackConfig {
        TrackConfig {
            codec: VideoCodec::H264,
            track_id: 1,
            timescale: 90000,
            width: 1280,
            height: 720,
            language: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(check_options(&options()).is_ok());
        assert!(check_tracks(&[track()]).is_ok());
    }

    #[test]
    fn missing_output_name_fails() {
        let mut opts = options();
        opts.output_file_name.clear();
        assert!(check_options(&opts).is_err());
    }

    #[test]
    fn template_requires_number_or_time() {
        assert!(check_segment_template("seg_$Number$.m4s").is_ok());
        assert!(check_segment_template("seg_$Time%08d$.m4s").is_ok());
        assert!(check_segment_template("seg_$Bandwidth$.m4s").is_err());
        assert!(check_segment_template("seg_.m4s").is_err());
    }

    #[test]
    fn duplicate_track_ids_fail() {
        let mut second = track();
        second.width = 640;
        assert!(check_tracks(&[track(), second]).is_err());
    }

    #[test]
    fn zero_timescale_fails() {
        let mut bad = track();
        bad.timescale = 0;
        assert!(check_tracks(&[bad]).is_err());
    }

    #[test]
    fn encryption_pattern_bounds() {
        let mut params = EncryptionParams::cenc([0; 16], vec![0; 16], vec![0; 8]);
        assert!(check_encryption(&params).is_ok());

        params.scheme = ProtectionScheme::Cbcs;
        params.iv = vec![0; 16];
        params.crypt_byte_block = 1;
        params.skip_byte_block = 9;
        assert!(check_encryption(&params).is_ok());

        params.crypt_byte_block = 16;
        assert!(check_encryption(&params).is_err());
    }

    #[test]
    fn dry_run_collects_all_errors() {
        let mut opts = options();
        opts.output_file_name.clear();
        let mut bad_track = track();
        bad_track.timescale = 0;

        let report = validate_packaging_config(&opts, &[bad_track], None);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
        assert!(!report.messages.is_empty());
    }
}
