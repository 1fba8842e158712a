//! Per-track fragment accumulation.
//!
//! A `Fragmenter` buffers converted (and possibly encrypted) samples for
//! one track until the segmenter cuts a fragment. It owns the pending
//! `trun` records, the fragment's media bytes, and the sample auxiliary
//! information that becomes `saiz`/`saio`/`senc`.

use crate::boxes::{
    self, SampleRecord, SAMPLE_FLAGS_NON_SYNC, SAMPLE_FLAGS_SYNC, SENC_DATA_POS,
};
use crate::crypto::sample::DecryptConfig;

/// One finalized fragment of one track, ready for `traf` serialization.
#[derive(Debug)]
pub struct TrackFragment {
    pub track_id: u32,
    /// DTS of the first sample (`tfdt` base media decode time).
    pub base_decode_time: u64,
    pub samples: Vec<SampleRecord>,
    /// Concatenated sample payloads, in `trun` order.
    pub data: Vec<u8>,
    /// Per-sample auxiliary info; empty for clear fragments.
    pub decrypt_configs: Vec<DecryptConfig>,
    /// IV width recorded per sample in `senc` (0 for constant-IV schemes).
    pub per_sample_iv_size: u8,
    /// Sum of sample durations, in the track timescale.
    pub duration: u64,
    /// Minimum PTS across the fragment's samples.
    pub earliest_presentation_time: u64,
    /// PTS of the first SAP in the fragment, if any.
    pub first_sap_time: Option<u64>,
    /// True when the first sample is a stream access point.
    pub starts_with_sap: bool,
}

impl TrackFragment {
    /// Serialize this fragment's `traf`.
    ///
    /// `data_offset` is the moof-relative offset of this track's first
    /// payload byte; `saio_offset` the moof-relative offset of the first
    /// `senc` auxiliary byte. Both are known only once the moof layout is
    /// fixed, so the segmenter builds trafs twice: first with zeros to
    /// measure, then with the real offsets (box sizes do not change).
    ///
    /// Returns the serialized box and, for encrypted fragments, the
    /// offset of the first auxiliary byte within the returned bytes.
    pub fn build_traf(&self, data_offset: i32, saio_offset: u32) -> (Vec<u8>, Option<usize>) {
        let mut payload = boxes::build_tfhd(self.track_id);
        payload.extend_from_slice(&boxes::build_tfdt(self.base_decode_time));
        payload.extend_from_slice(&boxes::build_trun(&self.samples, data_offset));

        let mut aux_data_pos = None;
        if !self.decrypt_configs.is_empty() {
            let aux_sizes: Vec<u32> = self
                .decrypt_configs
                .iter()
                .map(|config| config.aux_info_size())
                .collect();
            payload.extend_from_slice(&boxes::build_saiz(&aux_sizes));
            payload.extend_from_slice(&boxes::build_saio(saio_offset));
            // The aux data starts right after senc's sample_count field.
            aux_data_pos = Some(8 + payload.len() + SENC_DATA_POS);
            payload.extend_from_slice(&boxes::build_senc(
                &self.decrypt_configs,
                self.per_sample_iv_size,
            ));
        }

        (boxes::build_box(b"traf", &payload), aux_data_pos)
    }
}

/// Accumulates samples for one track into the pending fragment.
pub struct Fragmenter {
    track_id: u32,
    base_decode_time: u64,
    samples: Vec<SampleRecord>,
    data: Vec<u8>,
    decrypt_configs: Vec<DecryptConfig>,
    per_sample_iv_size: u8,
    duration: u64,
    earliest_pts: Option<u64>,
    first_sap_time: Option<u64>,
    starts_with_sap: bool,
    next_base_decode_time: u64,
}

impl Fragmenter {
    pub fn new(track_id: u32, per_sample_iv_size: u8) -> Self {
        Self {
            track_id,
            base_decode_time: 0,
            samples: Vec::new(),
            data: Vec::new(),
            decrypt_configs: Vec::new(),
            per_sample_iv_size,
            duration: 0,
            earliest_pts: None,
            first_sap_time: None,
            starts_with_sap: false,
            next_base_decode_time: 0,
        }
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    pub fn has_samples(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Duration accumulated in the pending fragment, in timescale units.
    pub fn fragment_duration(&self) -> u64 {
        self.duration
    }

    /// Append one sample's record, payload, and auxiliary info.
    pub fn add_sample(
        &mut self,
        dts: u64,
        pts: u64,
        duration: u32,
        is_key_frame: bool,
        payload: &[u8],
        decrypt_config: Option<DecryptConfig>,
    ) {
        if self.samples.is_empty() {
            self.base_decode_time = dts;
            self.starts_with_sap = is_key_frame;
        }
        if is_key_frame && self.first_sap_time.is_none() {
            self.first_sap_time = Some(pts);
        }
        self.earliest_pts = Some(match self.earliest_pts {
            Some(existing) => existing.min(pts),
            None => pts,
        });

        self.samples.push(SampleRecord {
            size: payload.len() as u32,
            duration,
            flags: if is_key_frame {
                SAMPLE_FLAGS_SYNC
            } else {
                SAMPLE_FLAGS_NON_SYNC
            },
            cts_offset: (pts as i64 - dts as i64) as i32,
        });
        self.data.extend_from_slice(payload);
        if let Some(config) = decrypt_config {
            self.decrypt_configs.push(config);
        }
        self.duration += u64::from(duration);
        self.next_base_decode_time = dts + u64::from(duration);
    }

    /// Cut the pending fragment and reset for the next one.
    ///
    /// Returns `None` when nothing has been buffered.
    pub fn finalize_fragment(&mut self) -> Option<TrackFragment> {
        if self.samples.is_empty() {
            return None;
        }
        let fragment = TrackFragment {
            track_id: self.track_id,
            base_decode_time: self.base_decode_time,
            samples: std::mem::take(&mut self.samples),
            data: std::mem::take(&mut self.data),
            decrypt_configs: std::mem::take(&mut self.decrypt_configs),
            per_sample_iv_size: self.per_sample_iv_size,
            duration: self.duration,
            earliest_presentation_time: self.earliest_pts.take().unwrap_or(0),
            first_sap_time: self.first_sap_time.take(),
            starts_with_sap: self.starts_with_sap,
        };
        self.duration = 0;
        self.starts_with_sap = false;
        self.base_decode_time = self.next_base_decode_time;
        Some(fragment)
    }
}
