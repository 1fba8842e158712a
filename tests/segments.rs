//! Segment-level integration tests: file layout, boundary policy, and
//! listener notifications.

mod support;

use std::sync::{Arc, Mutex};

use dashmux::api::{MemoryOutput, MuxerListener, Sample, SegmenterStats};
use dashmux::config::MuxerOptions;
use dashmux::error::Error;
use dashmux::segmenter::SegmenterBuilder;

use support::*;

fn multi_file_options() -> MuxerOptions {
    MuxerOptions {
        output_file_name: "init.mp4".into(),
        segment_template: "seg_$Number%05d$.m4s".into(),
        segment_duration_secs: 2.0,
        fragment_duration_secs: 1.0,
        ..Default::default()
    }
}

/// 30 fps stream with a key frame every `gop` frames.
fn feed_frames(
    segmenter: &mut dashmux::Segmenter<MemoryOutput>,
    count: u64,
    gop: u64,
) {
    for index in 0..count {
        let is_key = index % gop == 0;
        segmenter
            .add_sample(1, &frame_sample(index, is_key, 100))
            .expect("add_sample");
    }
}

#[test]
fn multi_file_output_has_init_and_segments() {
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .build(output.clone())
        .unwrap();

    // 2s segments at 30 fps with a 1s GOP: 120 frames -> 2 segments.
    feed_frames(&mut segmenter, 120, 30);
    let stats = segmenter.finalize().unwrap();

    assert_eq!(stats.segments_written, 2);
    assert_eq!(stats.samples_in, 120);
    assert_eq!(stats.samples_dropped, 0);

    let names = output.file_names();
    assert_eq!(names, vec!["init.mp4", "seg_00001.m4s", "seg_00002.m4s"]);

    // Init segment: ftyp + moov with trak/mvex/avcC.
    let init = output.file("init.mp4").unwrap();
    let boxes: Vec<_> = parse_boxes(&init).iter().map(|b| b.typ).collect();
    assert_eq!(boxes, vec![*b"ftyp", *b"moov"]);
    let moov = find_box(&init, b"moov").unwrap();
    assert!(child(&init, &moov, b"trak").is_some());
    let mvex = child(&init, &moov, b"mvex").unwrap();
    assert!(child(&init, &mvex, b"trex").is_some());
    assert!(init.windows(4).any(|w| w == b"avcC"));

    // Media segment: styp + sidx, then one moof/mdat pair per fragment
    // (1s fragments inside a 2s segment).
    let segment = output.file("seg_00001.m4s").unwrap();
    let types: Vec<_> = parse_boxes(&segment).iter().map(|b| b.typ).collect();
    assert_eq!(
        types,
        vec![*b"styp", *b"sidx", *b"moof", *b"mdat", *b"moof", *b"mdat"]
    );
}

#[test]
fn second_segment_tfdt_continues_decode_time() {
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .build(output.clone())
        .unwrap();

    feed_frames(&mut segmenter, 120, 30);
    segmenter.finalize().unwrap();

    let segment = output.file("seg_00002.m4s").unwrap();
    let moof = find_box(&segment, b"moof").unwrap();
    let traf = child(&segment, &moof, b"traf").unwrap();
    let tfdt = child(&segment, &traf, b"tfdt").unwrap();
    assert_eq!(tfdt.version(&segment), 1);
    let base = read_u64(&segment, tfdt.offset + 12);
    // Segment 2 starts at frame 60: 60 * 3000 ticks.
    assert_eq!(base, 180_000);
}

#[test]
fn trun_data_offset_points_into_mdat() {
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .build(output.clone())
        .unwrap();

    feed_frames(&mut segmenter, 60, 30);
    segmenter.finalize().unwrap();

    let segment = output.file("seg_00001.m4s").unwrap();
    let moof = find_box(&segment, b"moof").unwrap();
    let traf = child(&segment, &moof, b"traf").unwrap();
    let trun = child(&segment, &traf, b"trun").unwrap();

    // trun payload: version/flags, sample_count, data_offset.
    let data_offset = read_u32(&segment, trun.offset + 16) as usize;
    // The offset is moof-relative (default-base-is-moof).
    let first_sample = moof.offset + data_offset;
    let mdat = find_box(&segment, b"mdat").unwrap();
    assert_eq!(first_sample, mdat.offset + 8);

    // The first converted sample: a 4-byte length prefix followed by the
    // IDR slice (parameter sets stripped into the init segment).
    let nal_length = read_u32(&segment, first_sample) as usize;
    assert_eq!(segment[first_sample + 4], 0x65);
    assert_eq!(nal_length, 102); // 2 header bytes + 100 filler
}

#[test]
fn parameter_sets_never_appear_in_media_segments() {
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .build(output.clone())
        .unwrap();

    feed_frames(&mut segmenter, 60, 30);
    segmenter.finalize().unwrap();

    let segment = output.file("seg_00001.m4s").unwrap();
    let mdat = find_box(&segment, b"mdat").unwrap();
    let payload = mdat.payload(&segment);

    // Walk the length-prefixed NAL stream; only slice NALs may appear.
    let mut cursor = 0;
    while cursor + 4 <= payload.len() {
        let nal_len = read_u32(payload, cursor) as usize;
        let nal_type = payload[cursor + 4] & 0x1f;
        assert!(
            nal_type == 5 || nal_type == 1,
            "unexpected NAL type {} in sample data",
            nal_type
        );
        cursor += 4 + nal_len;
    }
    assert_eq!(cursor, payload.len());

    // The parameter sets live in the decoder configuration instead.
    let init = output.file("init.mp4").unwrap();
    let sps_pos = init
        .windows(TEST_SPS.len())
        .position(|w| w == TEST_SPS);
    assert!(sps_pos.is_some(), "SPS missing from avcC");
}

#[test]
fn segments_always_begin_on_stream_access_points() {
    // SAP-aligned cutting: key frames every 5 samples, segment duration
    // shorter than the GOP. Cuts must wait for the next SAP.
    let options = MuxerOptions {
        output_file_name: "init.mp4".into(),
        segment_template: "seg_$Number$.m4s".into(),
        segment_duration_secs: 0.6, // elapses mid-GOP
        fragment_duration_secs: 0.6,
        ..Default::default()
    };

    #[derive(Default)]
    struct Record {
        segments: Arc<Mutex<Vec<(u64, u64)>>>,
    }
    impl MuxerListener for Record {
        fn on_new_segment(&mut self, _name: &str, earliest: u64, duration: u64, _size: u64) {
            self.segments.lock().unwrap().push((earliest, duration));
        }
    }

    let listener = Record::default();
    let segments = listener.segments.clone();

    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(options)
        .add_track(video_track(1))
        .listener(Box::new(listener))
        .build(output.clone())
        .unwrap();

    // 15 samples, SAPs at 0, 5, 10. 0.6s at 90kHz = 54000 ticks = 18
    // frames worth? No: each sample is 9000 ticks (0.1s) here.
    for index in 0..15u64 {
        let is_key = index % 5 == 0;
        let sample = Sample::new(h264_access_unit(is_key, 50), index * 9000, 9000, is_key);
        segmenter.add_sample(1, &sample).unwrap();
    }
    segmenter.finalize().unwrap();

    // Segment duration elapses after 6 samples, but the cut waits for
    // the SAP at sample 10. Segments: [0..10), [10..15).
    let recorded = segments.lock().unwrap().clone();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].0, 0);
    assert_eq!(recorded[0].1, 10 * 9000);
    assert_eq!(recorded[1].0, 10 * 9000);
    assert_eq!(recorded[1].1, 5 * 9000);
}

#[test]
fn listener_receives_sample_duration_and_media_end() {
    #[derive(Default)]
    struct Record {
        durations: Arc<Mutex<Vec<u32>>>,
        ended: Arc<Mutex<Option<SegmenterStats>>>,
    }
    impl MuxerListener for Record {
        fn on_sample_duration_ready(&mut self, duration: u32) {
            self.durations.lock().unwrap().push(duration);
        }
        fn on_media_end(&mut self, stats: &SegmenterStats) {
            *self.ended.lock().unwrap() = Some(*stats);
        }
    }

    let listener = Record::default();
    let durations = listener.durations.clone();
    let ended = listener.ended.clone();

    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .listener(Box::new(listener))
        .build(output)
        .unwrap();

    feed_frames(&mut segmenter, 60, 30);
    let stats = segmenter.finalize().unwrap();

    assert_eq!(durations.lock().unwrap().as_slice(), &[3000]);
    assert_eq!(ended.lock().unwrap().unwrap(), stats);
}

#[test]
fn single_file_mode_writes_indexed_output() {
    let options = MuxerOptions {
        output_file_name: "media.mp4".into(),
        segment_template: String::new(),
        segment_duration_secs: 1.0,
        fragment_duration_secs: 1.0,
        ..Default::default()
    };
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(options)
        .add_track(video_track(1))
        .build(output.clone())
        .unwrap();

    feed_frames(&mut segmenter, 90, 30); // 3 segments of 1s
    segmenter.finalize().unwrap();

    assert_eq!(output.file_names(), vec!["media.mp4"]);
    let file = output.file("media.mp4").unwrap();

    let types: Vec<_> = parse_boxes(&file).iter().map(|b| b.typ).collect();
    assert_eq!(types[..3], [*b"ftyp", *b"moov", *b"sidx"]);
    assert!(types[3..].chunks(2).all(|c| c == [*b"moof", *b"mdat"]));

    // Ranges cover ftyp|moov and sidx exactly.
    let (init_offset, init_size) = segmenter.init_range().unwrap();
    assert_eq!(init_offset, 0);
    let sidx = find_box(&file, b"sidx").unwrap();
    assert_eq!(init_size, sidx.offset);
    let (index_offset, index_size) = segmenter.index_range().unwrap();
    assert_eq!(index_offset, sidx.offset);
    assert_eq!(index_size, sidx.size);

    // first_offset is 0: the first moof begins right after sidx.
    let first_moof = find_box(&file, b"moof").unwrap();
    assert_eq!(first_moof.offset, sidx.offset + sidx.size);
}

#[test]
fn multiple_tracks_share_one_moof_per_fragment() {
    let output = MemoryOutput::new();
    let mut second_track = video_track(2);
    second_track.width = 640;
    second_track.height = 360;

    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .add_track(second_track)
        .build(output.clone())
        .unwrap();

    for index in 0..60u64 {
        let is_key = index % 30 == 0;
        segmenter
            .add_sample(1, &frame_sample(index, is_key, 100))
            .unwrap();
        segmenter
            .add_sample(2, &frame_sample(index, is_key, 40))
            .unwrap();
    }
    segmenter.finalize().unwrap();

    let init = output.file("init.mp4").unwrap();
    let moov = find_box(&init, b"moov").unwrap();
    assert_eq!(
        children(&init, &moov)
            .iter()
            .filter(|b| &b.typ == b"trak")
            .count(),
        2
    );

    let segment = output.file("seg_00001.m4s").unwrap();
    let moof = find_box(&segment, b"moof").unwrap();
    let trafs: Vec<_> = children(&segment, &moof)
        .into_iter()
        .filter(|b| &b.typ == b"traf")
        .collect();
    assert_eq!(trafs.len(), 2);

    // Each traf's data offset lands inside the shared mdat, in track
    // order.
    let mdat = find_box(&segment, b"mdat").unwrap();
    let mut previous_offset = 0;
    for traf in &trafs {
        let trun = child(&segment, traf, b"trun").unwrap();
        let data_offset = read_u32(&segment, trun.offset + 16) as usize;
        let absolute = moof.offset + data_offset;
        assert!(absolute >= mdat.offset + 8);
        assert!(absolute < mdat.offset + mdat.size);
        assert!(absolute > previous_offset);
        previous_offset = absolute;
    }
}

#[test]
fn malformed_samples_are_dropped_then_escalate() {
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .build(output)
        .unwrap();

    segmenter
        .add_sample(1, &frame_sample(0, true, 100))
        .unwrap();

    // No start codes: dropped, not fatal, for the first ten.
    for index in 1..=10u64 {
        let bad = Sample::new(vec![0x65, 0x88, 0x00], index * 3000, 3000, false);
        segmenter.add_sample(1, &bad).unwrap();
    }
    assert_eq!(segmenter.stats().samples_dropped, 10);

    // The eleventh consecutive failure is fatal.
    let bad = Sample::new(vec![0x65, 0x88, 0x00], 33_000, 3000, false);
    let err = segmenter.add_sample(1, &bad).unwrap_err();
    assert!(matches!(err, Error::ParserFailure(_)));

    // The segmenter stays closed afterwards.
    let err = segmenter
        .add_sample(1, &frame_sample(12, false, 100))
        .unwrap_err();
    assert!(matches!(err, Error::InternalError(_)));
}

#[test]
fn changed_sps_mid_stream_drops_the_sample() {
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .build(output)
        .unwrap();

    segmenter
        .add_sample(1, &frame_sample(0, true, 100))
        .unwrap();

    // Same layout, different SPS bytes.
    let mut data = Vec::new();
    data.extend_from_slice(&[0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1e]);
    data.extend_from_slice(&[0, 0, 0, 1, 0x65, 0x88, 0xaa]);
    segmenter
        .add_sample(1, &Sample::new(data, 3000, 3000, true))
        .unwrap();
    assert_eq!(segmenter.stats().samples_dropped, 1);
}

#[test]
fn unknown_track_is_rejected() {
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .build(output)
        .unwrap();

    let err = segmenter
        .add_sample(9, &frame_sample(0, true, 10))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn finalize_twice_is_rejected() {
    let output = MemoryOutput::new();
    let mut segmenter = SegmenterBuilder::new(multi_file_options())
        .add_track(video_track(1))
        .build(output)
        .unwrap();

    feed_frames(&mut segmenter, 30, 30);
    segmenter.finalize().unwrap();
    assert!(segmenter.finalize().is_err());
    assert!(segmenter
        .add_sample(1, &frame_sample(30, true, 10))
        .is_err());
}

#[test]
fn builder_rejects_bad_configurations() {
    let output = MemoryOutput::new();

    // No tracks.
    assert!(matches!(
        SegmenterBuilder::new(multi_file_options()).build(output.clone()),
        Err(Error::InvalidArgument(_))
    ));

    // Bad template.
    let mut options = multi_file_options();
    options.segment_template = "segments.m4s".into();
    assert!(SegmenterBuilder::new(options)
        .add_track(video_track(1))
        .build(output)
        .is_err());
}
