use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;

use canwave_decode::capture::{Capture, CaptureColumns};
use canwave_decode::stdio::{get_input_reader, get_output_writer};
use canwave_decode::{AnnotationRecord, Baud, DecodeOptions, TrailingRun, decode};
use clap::Parser;

/// Decode CAN frames from an analog CAN_H/CAN_L capture
///
/// Reads a CSV of bus voltages (as exported by an oscilloscope or logic analyzer), recovers the
/// bits, and writes a CSV of annotations: one row per start-of-frame, decoded frame, frame field
/// (with --fields), and protocol error.
///
/// Example:
///
///     candecode capture.csv --baud 500000 --time-column time
///
/// The sample period comes from --sample-period, or is inferred from --time-column.
#[derive(Debug, Parser)]
#[clap(version, verbatim_doc_comment)]
struct Args {
    #[clap(short, long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    /// Path to the input capture. stdin if '-' or if not passed
    input: Option<PathBuf>,

    /// Path to the output annotations. stdout if '-' or if not passed
    output: Option<PathBuf>,

    /// Nominal bit rate of the bus
    #[clap(short, long, value_enum, default_value_t = Baud::default())]
    baud: Baud,

    /// Seconds between samples; overrides --time-column
    #[clap(short, long)]
    sample_period: Option<f64>,

    /// Column name or index of sample timestamps, in seconds
    #[clap(short, long)]
    time_column: Option<String>,

    /// Column name or index of the CAN_H voltage
    #[clap(long, default_value = "CAN_H")]
    can_h: String,

    /// Column name or index of the CAN_L voltage
    #[clap(long, default_value = "CAN_L")]
    can_l: String,

    /// Indicate the input CSV does not have a header
    #[clap(long)]
    no_header: bool,

    /// CSV delimiter
    #[clap(short, long, default_value_t = ',')]
    delimiter: char,

    /// Also annotate each frame's identifier, control, data, CRC, and ACK fields
    #[clap(short, long)]
    fields: bool,

    /// Discard the samples after the last edge instead of decoding them
    ///
    /// The last frame of the capture is lost, since its end of frame merges into the idle bus.
    #[clap(long)]
    drop_trailing_run: bool,
}

fn main() -> eyre::Result<()> {
    let use_color = std::io::stderr().is_terminal();
    if use_color {
        color_eyre::install()?;
    }

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(args.log_level.into())
        .with_env_var("CAN_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_color)
        .with_writer(std::io::stderr)
        .init();

    let start = Instant::now();

    let input = get_input_reader(&args.input)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(!args.no_header)
        .delimiter(args.delimiter as u8)
        .from_reader(input);
    let columns = CaptureColumns {
        can_h: args.can_h,
        can_l: args.can_l,
        time: args.time_column,
    };
    let capture = Capture::from_reader(&mut reader, &columns)?;
    let sample_period = capture.sample_period(args.sample_period)?;
    tracing::info!(
        "Read {} samples after {:?}",
        capture.can_h.len(),
        start.elapsed()
    );

    let options = DecodeOptions {
        baud: args.baud,
        trailing_run: if args.drop_trailing_run {
            TrailingRun::Drop
        } else {
            TrailingRun::Flush
        },
        field_annotations: args.fields,
    };
    let annotations = decode(&capture.can_h, &capture.can_l, sample_period, &options)?;

    let output = get_output_writer(&args.output)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(args.delimiter as u8)
        .from_writer(output);
    let mut frames = 0;
    let mut errors = 0;
    for annotation in &annotations {
        if annotation.message().is_some() {
            frames += 1;
        } else if annotation.is_error() {
            errors += 1;
        }
        writer.serialize(AnnotationRecord {
            annotation,
            sample_period,
        })?;
    }
    writer.flush()?;

    tracing::info!(
        "Decoded {frames} frames with {errors} errors in {} annotations after {:?}",
        annotations.len(),
        start.elapsed()
    );
    Ok(())
}
