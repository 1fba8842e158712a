//! Segment orchestration across tracks.
//!
//! The segmenter pumps samples through the per-track pipeline (bitstream
//! conversion, optional encryption, fragment accumulation), cuts
//! fragments and segments at stream access points, serializes
//! `moof`/`mdat` pairs, maintains `sidx` references, and routes finished
//! bytes to either a single indexed file or one file per segment.

use tracing::{debug, warn};

use crate::api::{MuxerListener, Sample, SegmentOutput, SegmenterStats, TrackConfig};
use crate::assert_invariant;
use crate::boxes::{self, BufferWriter, SegmentReference, TrackInit, TrackProtection, SAP_TYPE_UNKNOWN};
use crate::codec::BitstreamConverter;
use crate::config::{EncryptionParams, MuxerOptions, ProtectionSystem};
use crate::crypto::sample::SampleEncryptor;
use crate::error::{Error, Result};
use crate::fragmenter::{Fragmenter, TrackFragment};
use crate::validation;

/// Consecutive malformed access units tolerated per track before the
/// failure turns fatal.
pub const MAX_CONSECUTIVE_PARSE_FAILURES: u32 = 10;

/// Builder assembling a [`Segmenter`] from options, tracks, and optional
/// encryption.
pub struct SegmenterBuilder {
    options: MuxerOptions,
    tracks: Vec<TrackConfig>,
    encryption: Option<EncryptionParams>,
    listener: Option<Box<dyn MuxerListener>>,
}

impl SegmenterBuilder {
    pub fn new(options: MuxerOptions) -> Self {
        Self {
            options,
            tracks: Vec::new(),
            encryption: None,
            listener: None,
        }
    }

    /// Add a track; the first track added becomes the reference track
    /// whose SAPs drive segment boundaries.
    pub fn add_track(mut self, track: TrackConfig) -> Self {
        self.tracks.push(track);
        self
    }

    /// Enable Common Encryption with the given parameters.
    pub fn encryption(mut self, params: EncryptionParams) -> Self {
        self.encryption = Some(params);
        self
    }

    /// Attach a segment-event listener.
    pub fn listener(mut self, listener: Box<dyn MuxerListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Validate the configuration and construct the segmenter.
    pub fn build<O: SegmentOutput>(self, output: O) -> Result<Segmenter<O>> {
        validation::check_options(&self.options)?;
        validation::check_tracks(&self.tracks)?;
        if let Some(params) = &self.encryption {
            validation::check_encryption(params)?;
        }

        let mut listener = self.listener;
        let mut protection_systems = Vec::new();
        if let Some(params) = &self.encryption {
            protection_systems = params.protection_systems.clone();
            if let Some(listener) = listener.as_mut() {
                listener.on_encryption_info_ready(
                    &params.scheme.to_string(),
                    &params.key_id,
                    &params.iv,
                );
            }
        }

        let mut tracks = Vec::with_capacity(self.tracks.len());
        for config in self.tracks {
            let encryptor = match &self.encryption {
                Some(params) => Some(SampleEncryptor::new(params)?),
                None => None,
            };
            let per_sample_iv_size = self
                .encryption
                .as_ref()
                .map(|params| params.scheme.per_sample_iv_size())
                .unwrap_or(0);
            tracks.push(TrackContext {
                converter: config.codec.new_converter(),
                fragmenter: Fragmenter::new(config.track_id, per_sample_iv_size),
                encryptor,
                config,
                consecutive_parse_failures: 0,
            });
        }

        let clear_lead_secs = self
            .encryption
            .as_ref()
            .map(|params| params.clear_lead_secs)
            .unwrap_or(0.0);

        Ok(Segmenter {
            options: self.options,
            output,
            listener,
            tracks,
            protection_systems,
            clear_lead_secs,
            reference_track: 0,
            sequence_number: 1,
            segment_number: 1,
            segment_buffer: BufferWriter::new(),
            segment_references: Vec::new(),
            segment_start_dts: None,
            segment_encrypted: true,
            first_pts: None,
            media_buffer: Vec::new(),
            file_references: Vec::new(),
            init_written: false,
            init_range: None,
            index_range: None,
            stats: SegmenterStats::default(),
            sample_duration_reported: false,
            state: State::Open,
        })
    }
}

enum State {
    Open,
    Failed,
    Finalized,
}

struct TrackContext {
    config: TrackConfig,
    converter: Box<dyn BitstreamConverter>,
    encryptor: Option<SampleEncryptor>,
    fragmenter: Fragmenter,
    consecutive_parse_failures: u32,
}

/// The fragmented-MP4 segmenter. See the module docs for the overall
/// control flow.
pub struct Segmenter<O: SegmentOutput> {
    options: MuxerOptions,
    output: O,
    listener: Option<Box<dyn MuxerListener>>,
    tracks: Vec<TrackContext>,
    protection_systems: Vec<ProtectionSystem>,
    clear_lead_secs: f64,
    reference_track: usize,
    /// `mfhd` sequence number of the next fragment.
    sequence_number: u32,
    /// `$Number$` of the next segment, starting at 1.
    segment_number: u64,
    /// Serialized moof/mdat pairs of the current segment.
    segment_buffer: BufferWriter,
    /// One reference per fragment of the current segment.
    segment_references: Vec<SegmentReference>,
    /// Reference-track DTS at the start of the current segment.
    segment_start_dts: Option<u64>,
    /// Whether the current segment is encrypted (clear-lead handling).
    segment_encrypted: bool,
    /// Reference-track PTS of the very first sample.
    first_pts: Option<u64>,
    /// Single-file mode: accumulated segment bytes, flushed at finalize.
    media_buffer: Vec<u8>,
    /// Single-file mode: references across the whole file.
    file_references: Vec<SegmentReference>,
    init_written: bool,
    init_range: Option<(usize, usize)>,
    index_range: Option<(usize, usize)>,
    stats: SegmenterStats,
    sample_duration_reported: bool,
    state: State,
}

impl<O: SegmentOutput> Segmenter<O> {
    /// Feed one sample for the given track.
    ///
    /// Samples must arrive in decode order per track. A malformed sample
    /// is dropped with a warning; repeated consecutive failures escalate
    /// to a fatal parser error.
    pub fn add_sample(&mut self, track_id: u32, sample: &Sample) -> Result<()> {
        self.check_open()?;
        let track_index = self.track_index(track_id)?;
        self.stats.samples_in += 1;

        if track_index == self.reference_track {
            if self.first_pts.is_none() {
                self.first_pts = Some(sample.pts);
            }
            if let Err(err) = self.maybe_cut_boundary(sample) {
                return self.fail(err);
            }
            if self.segment_start_dts.is_none() {
                self.segment_start_dts = Some(sample.dts);
                self.segment_encrypted = self.segment_is_encrypted(sample.pts);
            }
        }

        let segment_encrypted = self.segment_encrypted;
        let conversion = self.tracks[track_index].converter.convert(&sample.data);
        let mut converted = match conversion {
            Ok(converted) => {
                self.tracks[track_index].consecutive_parse_failures = 0;
                converted
            }
            Err(Error::ParserFailure(msg)) => {
                self.tracks[track_index].consecutive_parse_failures += 1;
                let failures = self.tracks[track_index].consecutive_parse_failures;
                warn!(track_id, failures, "dropping malformed sample: {}", msg);
                self.stats.samples_dropped += 1;
                if failures > MAX_CONSECUTIVE_PARSE_FAILURES {
                    return self.fail(Error::parser(format!(
                        "track {}: {} consecutive malformed samples",
                        track_id, failures
                    )));
                }
                return Ok(());
            }
            Err(other) => return self.fail(other),
        };

        if converted.data.is_empty() {
            // Parameter sets only; nothing to buffer.
            return Ok(());
        }

        let decrypt_config = if segment_encrypted {
            let encryption = match self.tracks[track_index].encryptor.as_mut() {
                Some(encryptor) => encryptor
                    .encrypt_sample(
                        &mut converted.data,
                        &converted.nalus,
                        sample.iv_override.as_deref(),
                    )
                    .map(Some),
                None => Ok(None),
            };
            match encryption {
                Ok(config) => config,
                Err(err) => return self.fail(err),
            }
        } else {
            None
        };

        self.tracks[track_index].fragmenter.add_sample(
            sample.dts,
            sample.pts,
            sample.duration,
            converted.is_key_frame || sample.is_key_frame,
            &converted.data,
            decrypt_config,
        );

        if track_index == self.reference_track && !self.sample_duration_reported {
            self.sample_duration_reported = true;
            if let Some(listener) = self.listener.as_mut() {
                listener.on_sample_duration_ready(sample.duration);
            }
        }
        Ok(())
    }

    /// Flush everything pending and, in single-file mode, write the
    /// indexed output file. Further samples are rejected.
    pub fn finalize(&mut self) -> Result<SegmenterStats> {
        self.check_open()?;
        if let Err(err) = self.finalize_segment() {
            return self.fail(err);
        }

        if self.options.single_file() && !self.media_buffer.is_empty() {
            if let Err(err) = self.write_single_file() {
                return self.fail(err);
            }
        }

        self.state = State::Finalized;
        let stats = self.stats;
        if let Some(listener) = self.listener.as_mut() {
            listener.on_media_end(&stats);
        }
        debug!(
            segments = stats.segments_written,
            fragments = stats.fragments_written,
            bytes = stats.bytes_written,
            "segmenter finalized"
        );
        Ok(stats)
    }

    /// Byte range of `ftyp|moov` in single-file output, as
    /// `(offset, size)`. Available after [`Segmenter::finalize`].
    pub fn init_range(&self) -> Option<(usize, usize)> {
        self.init_range
    }

    /// Byte range of the `sidx` box in single-file output.
    pub fn index_range(&self) -> Option<(usize, usize)> {
        self.index_range
    }

    pub fn stats(&self) -> SegmenterStats {
        self.stats
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Failed => Err(Error::InternalError(
                "segmenter is closed after a previous error".into(),
            )),
            State::Finalized => Err(Error::invalid_argument(
                "segmenter has already been finalized",
            )),
        }
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.state = State::Failed;
        Err(err)
    }

    fn track_index(&self, track_id: u32) -> Result<usize> {
        self.tracks
            .iter()
            .position(|track| track.config.track_id == track_id)
            .ok_or_else(|| Error::invalid_argument(format!("unknown track id {}", track_id)))
    }

    fn ticks(&self, seconds: f64) -> u64 {
        let timescale = self.tracks[self.reference_track].config.timescale;
        (seconds * f64::from(timescale)).round() as u64
    }

    /// Clear-lead handling at segment granularity: a segment is encrypted
    /// when its first sample lies past the clear-lead window.
    fn segment_is_encrypted(&self, first_pts: u64) -> bool {
        if self.clear_lead_secs <= 0.0 {
            return true;
        }
        let threshold = self.first_pts.unwrap_or(0) + self.ticks(self.clear_lead_secs);
        first_pts >= threshold
    }

    /// Cut a segment or fragment ahead of `sample` when the configured
    /// duration has elapsed and the alignment policy allows it. Never
    /// cuts mid-GOP while SAP alignment is on.
    fn maybe_cut_boundary(&mut self, sample: &Sample) -> Result<()> {
        let Some(start_dts) = self.segment_start_dts else {
            return Ok(());
        };
        let elapsed = sample.dts.saturating_sub(start_dts);
        let segment_ticks = self.ticks(self.options.segment_duration_secs);
        let fragment_ticks = self.ticks(self.options.fragment_duration_secs);

        let segment_cut_allowed = sample.is_key_frame || !self.options.segment_sap_aligned;
        let fragment_cut_allowed = sample.is_key_frame || !self.options.fragment_sap_aligned;

        if elapsed >= segment_ticks && segment_cut_allowed {
            self.finalize_segment()?;
        } else if self.tracks[self.reference_track]
            .fragmenter
            .fragment_duration()
            >= fragment_ticks
            && fragment_cut_allowed
        {
            self.finalize_fragment()?;
        }
        Ok(())
    }

    /// Cut the pending fragment on every track and serialize one
    /// `moof`/`mdat` pair into the segment buffer.
    fn finalize_fragment(&mut self) -> Result<()> {
        let fragments: Vec<TrackFragment> = self
            .tracks
            .iter_mut()
            .filter_map(|track| track.fragmenter.finalize_fragment())
            .collect();
        if fragments.is_empty() {
            return Ok(());
        }

        let bytes = serialize_fragment(self.sequence_number, &fragments);
        self.sequence_number += 1;
        self.stats.fragments_written += 1;

        let reference_id = self.tracks[self.reference_track].config.track_id;
        let reference_fragment = fragments
            .iter()
            .find(|fragment| fragment.track_id == reference_id)
            .unwrap_or(&fragments[0]);

        let earliest = reference_fragment.earliest_presentation_time;
        let (sap_type, sap_delta_time) = match reference_fragment.first_sap_time {
            Some(sap_time) => (1, (sap_time - earliest) as u32),
            None => (SAP_TYPE_UNKNOWN, 0),
        };
        self.segment_references.push(SegmentReference {
            referenced_size: bytes.len() as u32,
            subsegment_duration: reference_fragment.duration as u32,
            earliest_presentation_time: earliest,
            sap_type,
            sap_delta_time,
        });

        self.segment_buffer.write_bytes(&bytes);
        Ok(())
    }

    /// Close the current segment: write it out (multi-file) or append it
    /// to the single-file media buffer, and notify the listener.
    fn finalize_segment(&mut self) -> Result<()> {
        self.finalize_fragment()?;
        self.segment_start_dts = None;
        if self.segment_buffer.is_empty() {
            return Ok(());
        }

        let mut references = std::mem::take(&mut self.segment_references);
        let fragment_bytes = std::mem::replace(&mut self.segment_buffer, BufferWriter::new());
        let fragment_bytes = fragment_bytes.into_inner();
        let duration: u64 = references
            .iter()
            .map(|reference| u64::from(reference.subsegment_duration))
            .sum();
        self.stats.duration += duration;

        if self.options.single_file() {
            let earliest = references[0].earliest_presentation_time;
            let size = fragment_bytes.len() as u64;
            self.file_references.extend(references);
            self.media_buffer.extend_from_slice(&fragment_bytes);
            self.stats.segments_written += 1;
            let file_name = self.options.output_file_name.clone();
            self.notify_new_segment(&file_name, earliest, duration, size);
        } else {
            self.ensure_init_written()?;
            coalesce_references(&mut references, self.options.num_subsegments_per_sidx);
            let earliest = references[0].earliest_presentation_time;

            let mut buffer = BufferWriter::new();
            buffer.write_bytes(&boxes::build_styp());
            if self.options.num_subsegments_per_sidx >= 0 {
                let reference_track = &self.tracks[self.reference_track].config;
                buffer.write_bytes(&boxes::build_sidx(
                    reference_track.track_id,
                    reference_track.timescale,
                    earliest,
                    0,
                    &references,
                ));
            }
            buffer.write_bytes(&fragment_bytes);

            let file_name = fill_segment_template(
                &self.options.segment_template,
                self.segment_number,
                earliest,
                self.options.bandwidth,
                &self.options.representation_id,
            )?;
            let data = buffer.into_inner();
            self.output
                .write_file(&file_name, &data)
                .map_err(|err| Error::file(file_name.clone(), err))?;
            self.stats.bytes_written += data.len() as u64;
            self.stats.segments_written += 1;
            debug!(file = %file_name, size = data.len(), "segment written");
            self.notify_new_segment(&file_name, earliest, duration, data.len() as u64);
        }

        self.segment_number += 1;
        Ok(())
    }

    fn notify_new_segment(&mut self, file_name: &str, earliest: u64, duration: u64, size: u64) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_new_segment(file_name, earliest, duration, size);
        }
    }

    fn ensure_init_written(&mut self) -> Result<()> {
        if self.init_written {
            return Ok(());
        }
        let init = self.build_init()?;
        self.output
            .write_file(&self.options.output_file_name, &init)
            .map_err(|err| Error::file(self.options.output_file_name.clone(), err))?;
        self.stats.bytes_written += init.len() as u64;
        self.init_written = true;
        Ok(())
    }

    /// `ftyp|moov` from the converters' decoder configuration records.
    fn build_init(&self) -> Result<Vec<u8>> {
        let mut track_inits = Vec::with_capacity(self.tracks.len());
        for track in &self.tracks {
            let decoder_config_record =
                track.converter.decoder_config_record().ok_or_else(|| {
                    Error::parser(format!(
                        "track {}: no parameter sets observed before init segment",
                        track.config.track_id
                    ))
                })?;
            let protection = track.encryptor.as_ref().map(|encryptor| TrackProtection {
                scheme: encryptor.scheme(),
                key_id: *encryptor.key_id(),
                constant_iv: encryptor.constant_iv().map(<[u8]>::to_vec),
                crypt_byte_block: encryptor.crypt_byte_block(),
                skip_byte_block: encryptor.skip_byte_block(),
            });
            track_inits.push(TrackInit {
                track_id: track.config.track_id,
                codec: track.config.codec,
                timescale: track.config.timescale,
                width: track.config.width,
                height: track.config.height,
                language: track.config.language.clone(),
                decoder_config_record,
                protection,
            });
        }

        let codecs: Vec<_> = self.tracks.iter().map(|track| track.config.codec).collect();
        let mut init = boxes::build_ftyp(&codecs);
        init.extend_from_slice(&boxes::build_moov(&track_inits, &self.protection_systems));
        Ok(init)
    }

    /// Assemble `ftyp|moov|sidx|fragments` and record the init/index byte
    /// ranges for on-demand manifests.
    fn write_single_file(&mut self) -> Result<()> {
        let init = self.build_init()?;
        let mut references = std::mem::take(&mut self.file_references);
        coalesce_references(&mut references, self.options.num_subsegments_per_sidx);

        let mut file = BufferWriter::new();
        file.write_bytes(&init);
        self.init_range = Some((0, init.len()));

        if self.options.num_subsegments_per_sidx >= 0 && !references.is_empty() {
            let reference_track = &self.tracks[self.reference_track].config;
            let sidx = boxes::build_sidx(
                reference_track.track_id,
                reference_track.timescale,
                references[0].earliest_presentation_time,
                0,
                &references,
            );
            self.index_range = Some((init.len(), sidx.len()));
            file.write_bytes(&sidx);
        }

        file.write_bytes(&self.media_buffer);
        self.media_buffer.clear();

        let data = file.into_inner();
        self.output
            .write_file(&self.options.output_file_name, &data)
            .map_err(|err| Error::file(self.options.output_file_name.clone(), err))?;
        self.stats.bytes_written += data.len() as u64;
        Ok(())
    }
}

/// Serialize one fragment: `moof` (one `traf` per track) followed by a
/// single `mdat` with the tracks' payloads back to back.
///
/// Trun data offsets and `saio` offsets are moof-relative, so trafs are
/// built twice: once with zeros to fix the layout, then with the real
/// offsets. Box sizes are identical in both passes.
fn serialize_fragment(sequence_number: u32, fragments: &[TrackFragment]) -> Vec<u8> {
    let mfhd_len = boxes::build_mfhd(sequence_number).len();
    let provisional: Vec<(Vec<u8>, Option<usize>)> = fragments
        .iter()
        .map(|fragment| fragment.build_traf(0, 0))
        .collect();

    let moof_size: usize =
        8 + mfhd_len + provisional.iter().map(|(traf, _)| traf.len()).sum::<usize>();
    let mdat_payload: usize = fragments.iter().map(|fragment| fragment.data.len()).sum();

    let mut trafs = Vec::with_capacity(fragments.len());
    let mut traf_pos = 8 + mfhd_len;
    let mut data_pos = moof_size + 8; // moof + mdat header
    for (index, fragment) in fragments.iter().enumerate() {
        let saio_offset = provisional[index]
            .1
            .map(|aux_pos| (traf_pos + aux_pos) as u32)
            .unwrap_or(0);
        let (traf, _) = fragment.build_traf(data_pos as i32, saio_offset);
        assert_invariant!(
            traf.len() == provisional[index].0.len(),
            "traf size must not change when offsets are patched",
            "segmenter::serialize_fragment"
        );
        traf_pos += traf.len();
        data_pos += fragment.data.len();
        trafs.push(traf);
    }

    let moof = boxes::build_moof(sequence_number, &trafs);
    assert_invariant!(
        moof.len() == moof_size,
        "moof size must match the measured layout",
        "segmenter::serialize_fragment"
    );

    let mut out = moof;
    out.extend_from_slice(&boxes::build_mdat_header(mdat_payload));
    for fragment in fragments {
        out.extend_from_slice(&fragment.data);
    }
    out
}

/// Coalesce per-fragment references into at most `num_subsegments`
/// subsegments: groups of `ceil(total / num_subsegments)` consecutive
/// references are summed, the group keeps the earliest presentation time
/// and the first known SAP.
pub(crate) fn coalesce_references(references: &mut Vec<SegmentReference>, num_subsegments: i32) {
    if num_subsegments <= 0 || references.is_empty() {
        return;
    }
    let per_group = references.len().div_ceil(num_subsegments as usize);
    if per_group <= 1 {
        return;
    }

    let mut coalesced = Vec::with_capacity(num_subsegments as usize);
    for group in references.chunks(per_group) {
        let mut combined = group[0];
        let mut first_sap_time = u64::from(combined.sap_delta_time) + combined.earliest_presentation_time;
        let mut sap_known = combined.sap_type != SAP_TYPE_UNKNOWN;
        for reference in &group[1..] {
            combined.referenced_size += reference.referenced_size;
            combined.subsegment_duration += reference.subsegment_duration;
            combined.earliest_presentation_time = combined
                .earliest_presentation_time
                .min(reference.earliest_presentation_time);
            if !sap_known && reference.sap_type != SAP_TYPE_UNKNOWN {
                combined.sap_type = reference.sap_type;
                first_sap_time =
                    u64::from(reference.sap_delta_time) + reference.earliest_presentation_time;
                sap_known = true;
            }
        }
        if sap_known {
            combined.sap_delta_time =
                (first_sap_time - combined.earliest_presentation_time) as u32;
        } else {
            combined.sap_type = SAP_TYPE_UNKNOWN;
            combined.sap_delta_time = 0;
        }
        coalesced.push(combined);
    }
    *references = coalesced;
}

/// Expand a DASH segment name template.
///
/// Supports `$Number$`, `$Time$`, `$Bandwidth$` (each with an optional
/// `%0Nd` width), `$RepresentationID$`, and the `$$` escape.
pub fn fill_segment_template(
    template: &str,
    number: u64,
    time: u64,
    bandwidth: u32,
    representation_id: &str,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('$').ok_or_else(|| {
            Error::invalid_argument(format!("unterminated identifier in template: {}", template))
        })?;
        let identifier = &after[..end];
        rest = &after[end + 1..];

        if identifier.is_empty() {
            out.push('$');
            continue;
        }

        let (name, width) = split_format(identifier)?;
        match name {
            "Number" => out.push_str(&format_with_width(number, width)),
            "Time" => out.push_str(&format_with_width(time, width)),
            "Bandwidth" => out.push_str(&format_with_width(u64::from(bandwidth), width)),
            "RepresentationID" => {
                if width.is_some() {
                    return Err(Error::invalid_argument(
                        "$RepresentationID$ does not take a width format",
                    ));
                }
                out.push_str(representation_id);
            }
            other => {
                return Err(Error::invalid_argument(format!(
                    "unknown template identifier ${}$",
                    other
                )))
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Split `Number%05d` into the identifier name and the zero-pad width.
pub(crate) fn split_format(identifier: &str) -> Result<(&str, Option<usize>)> {
    let Some(percent) = identifier.find('%') else {
        return Ok((identifier, None));
    };
    let (name, format) = identifier.split_at(percent);
    let digits = format
        .strip_prefix("%0")
        .and_then(|rest| rest.strip_suffix('d'))
        .ok_or_else(|| {
            Error::invalid_argument(format!("bad width format in ${}$", identifier))
        })?;
    if digits.is_empty() || digits.bytes().any(|b| !b.is_ascii_digit()) {
        return Err(Error::invalid_argument(format!(
            "bad width format in ${}$",
            identifier
        )));
    }
    let width: usize = digits
        .parse()
        .map_err(|_| Error::invalid_argument(format!("bad width format in ${}$", identifier)))?;
    Ok((name, Some(width)))
}

fn format_with_width(value: u64, width: Option<usize>) -> String {
    match width {
        Some(width) => format!("{:0width$}", value),
        None => value.to_string(),
    }
}
