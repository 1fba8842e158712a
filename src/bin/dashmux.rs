use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use dashmux::api::{DiskOutput, MuxerListener, Sample, SegmenterStats, TrackConfig};
use dashmux::codec::common::{AnnexBNalIter, BitReader};
use dashmux::codec::{h264, h265, VideoCodec};
use dashmux::config::{EncryptionParams, MuxerOptions, ProtectionScheme};
use dashmux::segmenter::SegmenterBuilder;
use dashmux::validation;

fn read_hex_bytes(input: &str) -> Result<Vec<u8>> {
    let hex: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if hex.len() % 2 != 0 {
        bail!("hex string must have even length");
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let byte = u8::from_str_radix(&hex[i..i + 2], 16)
            .with_context(|| format!("invalid hex at offset {}", i))?;
        out.push(byte);
    }
    Ok(out)
}

/// dashmux - DASH fragmented-MP4 segmenter with Common Encryption
///
/// Consumes a raw Annex B H.264/H.265 elementary stream and produces DASH
/// segments, optionally encrypted under cenc/cens/cbc1/cbcs.
#[derive(Parser)]
#[command(name = "dashmux")]
#[command(version, about, long_about)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output to JSON (for automation)
    #[arg(long)]
    json: bool,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct EncryptionArgs {
    /// Protection scheme (cenc, cens, cbc1, cbcs)
    #[arg(long)]
    protection_scheme: Option<ProtectionScheme>,

    /// Key identifier (16 bytes, hex)
    #[arg(long)]
    key_id: Option<String>,

    /// AES key (16/24/32 bytes, hex)
    #[arg(long)]
    key: Option<String>,

    /// Initial IV (8 bytes for CTR schemes, 16 for CBC, hex)
    #[arg(long)]
    iv: Option<String>,

    /// Encrypted blocks per pattern run (cens/cbcs)
    #[arg(long, default_value = "0")]
    crypt_byte_block: u8,

    /// Skipped blocks per pattern run (cens/cbcs)
    #[arg(long, default_value = "0")]
    skip_byte_block: u8,

    /// Leading seconds left unencrypted
    #[arg(long, default_value = "0")]
    clear_lead: f64,
}

impl EncryptionArgs {
    fn to_params(&self) -> Result<Option<EncryptionParams>> {
        let Some(scheme) = self.protection_scheme else {
            if self.key.is_some() || self.key_id.is_some() || self.iv.is_some() {
                bail!("--protection-scheme is required when key material is given");
            }
            return Ok(None);
        };
        let key_id_bytes = read_hex_bytes(
            self.key_id
                .as_deref()
                .context("--key-id is required for encryption")?,
        )?;
        let key_id: [u8; 16] = key_id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("--key-id must be exactly 16 bytes"))?;
        let key = read_hex_bytes(self.key.as_deref().context("--key is required")?)?;
        let iv = read_hex_bytes(self.iv.as_deref().context("--iv is required")?)?;

        Ok(Some(EncryptionParams {
            scheme,
            key_id,
            key,
            iv,
            crypt_byte_block: self.crypt_byte_block,
            skip_byte_block: self.skip_byte_block,
            protection_systems: Vec::new(),
            clear_lead_secs: self.clear_lead,
        }))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Segment an elementary stream into DASH media segments
    #[command(alias = "p")]
    Package {
        /// Input Annex B elementary stream
        #[arg(short, long)]
        input: PathBuf,

        /// Init segment (multi-file) or full output file (single-file)
        #[arg(short, long)]
        output: String,

        /// Segment name template; empty selects single-file output
        #[arg(long, default_value = "")]
        segment_template: String,

        /// Video codec
        #[arg(long, default_value = "h264")]
        codec: VideoCodec,

        /// Video width
        #[arg(long)]
        width: u32,

        /// Video height
        #[arg(long)]
        height: u32,

        /// Frame rate used to derive timestamps
        #[arg(long, default_value = "30")]
        fps: f64,

        /// Target segment duration in seconds
        #[arg(long, default_value = "6")]
        segment_duration: f64,

        /// Target fragment duration in seconds
        #[arg(long, default_value = "2")]
        fragment_duration: f64,

        /// -1 disables sidx, 0 one reference per fragment, N coalesces
        #[arg(long, default_value = "0")]
        num_subsegments_per_sidx: i32,

        /// Bandwidth for $Bandwidth$ templating
        #[arg(long, default_value = "0")]
        bandwidth: u32,

        /// Representation id for $RepresentationID$ templating
        #[arg(long, default_value = "")]
        representation_id: String,

        #[command(flatten)]
        encryption: EncryptionArgs,

        /// Validate the configuration without writing output
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a packaging configuration without reading media
    #[command(alias = "v")]
    Validate {
        #[arg(short, long)]
        output: String,

        #[arg(long, default_value = "")]
        segment_template: String,

        #[arg(long, default_value = "h264")]
        codec: VideoCodec,

        #[arg(long)]
        width: u32,

        #[arg(long)]
        height: u32,

        #[command(flatten)]
        encryption: EncryptionArgs,
    },

    /// Display stream information for an Annex B file
    #[command(alias = "i")]
    Info {
        input: PathBuf,

        #[arg(long, default_value = "h264")]
        codec: VideoCodec,
    },
}

#[derive(Debug, Serialize)]
struct PackageReport {
    stats: SegmenterStats,
    segments: Vec<SegmentRecord>,
}

#[derive(Debug, Serialize, Clone)]
struct SegmentRecord {
    file_name: String,
    earliest_pts: u64,
    duration: u64,
    size: u64,
}

/// Collects listener callbacks for the final report.
#[derive(Default)]
struct ReportListener {
    segments: std::sync::Arc<std::sync::Mutex<Vec<SegmentRecord>>>,
}

impl MuxerListener for ReportListener {
    fn on_new_segment(&mut self, file_name: &str, earliest_pts: u64, duration: u64, size: u64) {
        if let Ok(mut segments) = self.segments.lock() {
            segments.push(SegmentRecord {
                file_name: file_name.to_string(),
                earliest_pts,
                duration,
                size,
            });
        }
    }
}

/// Split an Annex B stream into access units at picture starts
/// (first_mb_in_slice == 0 / first_slice_segment_in_pic_flag).
fn split_access_units(data: &[u8], codec: VideoCodec) -> Vec<Vec<u8>> {
    let mut units: Vec<Vec<u8>> = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut current_has_vcl = false;

    for nal in AnnexBNalIter::new(data) {
        if nal.is_empty() {
            continue;
        }
        let (is_vcl, starts_picture) = match codec {
            VideoCodec::H264 => {
                let nal_type = h264::h264_nal_type(nal);
                let is_vcl = h264::is_vcl_nal_type(nal_type);
                // first_mb_in_slice == 0 marks the first slice of a
                // picture.
                let starts =
                    is_vcl && BitReader::new(&nal[1..]).read_ue() == Some(0);
                (is_vcl, starts)
            }
            VideoCodec::H265 => {
                let nal_type = h265::hevc_nal_type(nal);
                let is_vcl = h265::is_vcl_nal_type(nal_type);
                // first_slice_segment_in_pic_flag is the first bit after
                // the two-byte NAL header.
                let starts = is_vcl
                    && nal.len() > 2
                    && BitReader::new(&nal[2..]).read_bit() == Some(1);
                (is_vcl, starts)
            }
        };

        if current_has_vcl && (starts_picture || !is_vcl) {
            units.push(std::mem::take(&mut current));
            current_has_vcl = false;
        }
        current.extend_from_slice(&[0, 0, 0, 1]);
        current.extend_from_slice(nal);
        if is_vcl {
            current_has_vcl = true;
        }
    }
    if !current.is_empty() {
        units.push(current);
    }
    units
}

fn is_key_frame(unit: &[u8], codec: VideoCodec) -> bool {
    match codec {
        VideoCodec::H264 => AnnexBNalIter::new(unit)
            .any(|nal| h264::h264_nal_type(nal) == h264::nal_type::IDR_SLICE),
        VideoCodec::H265 => AnnexBNalIter::new(unit)
            .any(|nal| h265::is_irap_nal_type(h265::hevc_nal_type(nal))),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("dashmux=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dashmux=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Package {
            input,
            output,
            segment_template,
            codec,
            width,
            height,
            fps,
            segment_duration,
            fragment_duration,
            num_subsegments_per_sidx,
            bandwidth,
            representation_id,
            encryption,
            dry_run,
        } => {
            let options = MuxerOptions {
                output_file_name: output,
                segment_template,
                segment_duration_secs: segment_duration,
                fragment_duration_secs: fragment_duration,
                segment_sap_aligned: true,
                fragment_sap_aligned: true,
                num_subsegments_per_sidx,
                bandwidth,
                representation_id,
            };
            let track = TrackConfig {
                codec,
                track_id: 1,
                timescale: 90_000,
                width,
                height,
                language: None,
            };
            let encryption = encryption.to_params()?;

            if dry_run {
                return report_validation(&options, &track, encryption.as_ref(), cli.json);
            }

            let data = fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let units = split_access_units(&data, codec);
            if units.is_empty() {
                bail!("no access units found in {}", input.display());
            }

            let progress = if cli.no_progress {
                None
            } else {
                let pb = ProgressBar::new(units.len() as u64);
                pb.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.green} [{elapsed_precise}] {bar:30} {pos}/{len} frames",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                Some(pb)
            };

            let listener = ReportListener::default();
            let segments = listener.segments.clone();

            let mut builder = SegmenterBuilder::new(options)
                .add_track(track)
                .listener(Box::new(listener));
            if let Some(params) = encryption {
                builder = builder.encryption(params);
            }
            let mut segmenter = builder.build(DiskOutput::new())?;

            let duration_ticks = (90_000f64 / fps).round() as u32;
            for (index, unit) in units.iter().enumerate() {
                let dts = index as u64 * u64::from(duration_ticks);
                let key = is_key_frame(unit, codec);
                segmenter.add_sample(1, &Sample::new(unit.clone(), dts, duration_ticks, key))?;
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            }
            let stats = segmenter.finalize()?;
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }

            let report = PackageReport {
                stats,
                segments: segments.lock().map(|s| s.clone()).unwrap_or_default(),
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Wrote {} segments ({} fragments, {} bytes) from {} samples",
                    report.stats.segments_written,
                    report.stats.fragments_written,
                    report.stats.bytes_written,
                    report.stats.samples_in
                );
                if cli.verbose {
                    for segment in &report.segments {
                        println!(
                            "  {} pts={} duration={} size={}",
                            segment.file_name, segment.earliest_pts, segment.duration, segment.size
                        );
                    }
                }
            }
            Ok(())
        }

        Commands::Validate {
            output,
            segment_template,
            codec,
            width,
            height,
            encryption,
        } => {
            let options = MuxerOptions {
                output_file_name: output,
                segment_template,
                ..Default::default()
            };
            let track = TrackConfig {
                codec,
                track_id: 1,
                timescale: 90_000,
                width,
                height,
                language: None,
            };
            let encryption = encryption.to_params()?;
            report_validation(&options, &track, encryption.as_ref(), cli.json)
        }

        Commands::Info { input, codec } => {
            let data = fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let units = split_access_units(&data, codec);
            let nal_count = AnnexBNalIter::new(&data).count();
            let key_frames = units.iter().filter(|u| is_key_frame(u, codec)).count();

            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "codec": codec.to_string(),
                        "nal_units": nal_count,
                        "access_units": units.len(),
                        "key_frames": key_frames,
                    })
                );
            } else {
                println!("Codec:        {}", codec);
                println!("NAL units:    {}", nal_count);
                println!("Access units: {}", units.len());
                println!("Key frames:   {}", key_frames);
            }
            Ok(())
        }
    }
}

fn report_validation(
    options: &MuxerOptions,
    track: &TrackConfig,
    encryption: Option<&EncryptionParams>,
    json: bool,
) -> Result<()> {
    let report =
        validation::validate_packaging_config(options, std::slice::from_ref(track), encryption);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for message in &report.messages {
            println!("{}", message);
        }
        for error in &report.errors {
            eprintln!("error: {}", error);
        }
        if report.is_valid {
            println!("Configuration is valid.");
        }
    }
    if report.is_valid {
        Ok(())
    } else {
        bail!("configuration is invalid");
    }
}
