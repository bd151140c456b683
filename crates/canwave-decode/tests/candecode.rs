use std::collections::HashMap;

use canwave_test::synth::{FrameSpec, Waveform, encode_frame};
use canwave_test::{CommandExt, tempfile, tool};
use pretty_assertions::assert_eq;

/// 20 samples per bit at 500 kbaud
const SAMPLE_PERIOD: f64 = 1e-7;

fn rows(stdout: &[u8]) -> Vec<HashMap<String, String>> {
    csv::Reader::from_reader(stdout)
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap()
}

fn capture() -> Waveform {
    Waveform::new(20)
        .idle(12)
        .frame(&FrameSpec::standard(0x123, &[0xAB, 0xCD]))
        .idle(5)
}

#[test]
fn decode_frame_from_stdin() {
    let output = tool!("candecode")
        .arg("--baud=500000")
        .arg("--sample-period=1e-7")
        .write_stdin(capture().to_csv(SAMPLE_PERIOD))
        .captured_output()
        .unwrap();
    assert!(output.status.success());

    let rows = rows(&output.stdout);
    assert_eq!(rows.len(), 2);

    let sof = &rows[0];
    assert_eq!(sof["category"], "sof");
    assert_eq!(sof["label"], "SOF");
    assert_eq!(sof["start"], "240");
    assert_eq!(sof["end"], "260");
    assert_eq!(sof["canid"], "");

    let frame = &rows[1];
    assert_eq!(frame["category"], "frame");
    assert_eq!(frame["label"], "0x123 [2] ABCD");
    assert_eq!(frame["start"], "240");
    assert_eq!(frame["canid"], "0x123");
    assert_eq!(frame["extended"], "false");
    assert_eq!(frame["remote"], "false");
    assert_eq!(frame["dlc"], "2");
    assert_eq!(frame["data"], "ABCD");
    assert_eq!(frame["ack"], "true");
    for error in ["stuffing_error", "eof_error", "intermission_error", "crc_error"] {
        assert_eq!(frame[error], "", "{error} should be empty");
    }
    let start_time: f64 = frame["start_time"].parse().unwrap();
    assert!((start_time - 240.0 * SAMPLE_PERIOD).abs() < 1e-12);
}

#[test]
fn infer_sample_period_from_time_column() {
    let input = tempfile(capture().to_csv(SAMPLE_PERIOD)).unwrap();
    let output = tool!("candecode")
        .arg("--baud=500000")
        .arg("--time-column=time")
        .arg(input.path())
        .captured_output()
        .unwrap();
    assert!(output.status.success());

    let rows = rows(&output.stdout);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["canid"], "0x123");
    assert_eq!(rows[1]["data"], "ABCD");
}

#[test]
fn sample_period_is_required() {
    let output = tool!("candecode")
        .arg("--baud=500000")
        .write_stdin(capture().to_csv(SAMPLE_PERIOD))
        .captured_output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn flat_capture_is_empty() {
    let input = Waveform::new(20).idle(100).to_csv(SAMPLE_PERIOD);
    let output = tool!("candecode")
        .arg("--baud=500000")
        .arg("--sample-period=1e-7")
        .write_stdin(input)
        .captured_output()
        .unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn field_annotations_and_errors() {
    let mut frame = encode_frame(&FrameSpec::extended(0x18FEF100, &[0x01]));
    let dominant = frame.end_of_frame() + 3;
    frame.bits[dominant] = false;
    let wave = Waveform::new(20).idle(12).encoded(&frame).idle(4);

    let output = tool!("candecode")
        .arg("--baud=500000")
        .arg("--sample-period=1e-7")
        .arg("--fields")
        .write_stdin(wave.to_csv(SAMPLE_PERIOD))
        .captured_output()
        .unwrap();
    assert!(output.status.success());

    let rows = rows(&output.stdout);
    let labels: Vec<&str> = rows.iter().map(|r| r["label"].as_str()).collect();
    assert_eq!(
        labels[..5],
        ["SOF", "0x18FEF100 EXT [1] 01", "ID 0x18FEF100", "DLC 1", "0x01"]
    );
    let eof_error = wave.sample_of(12 + dominant).to_string();
    assert_eq!(rows[1]["eof_error"], eof_error);

    let last = rows.last().unwrap();
    assert_eq!(last["category"], "error");
    assert_eq!(last["label"], "End of frame error");
    assert_eq!(last["start"], eof_error);
}

#[test]
fn named_columns_and_output_file() {
    let csv = capture()
        .to_csv(SAMPLE_PERIOD)
        .replacen("time,CAN_H,CAN_L", "t;high;low", 1)
        .replace(',', ";");
    let input = tempfile(csv).unwrap();
    let output_file = tempfile("").unwrap();

    let output = tool!("candecode")
        .arg("--baud=500000")
        .arg("--delimiter=;")
        .arg("--time-column=t")
        .arg("--can-h=high")
        .arg("--can-l=2")
        .arg(input.path())
        .arg(output_file.path())
        .captured_output()
        .unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let written = std::fs::read_to_string(output_file.path()).unwrap();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_reader(written.as_bytes());
    let rows: Vec<HashMap<String, String>> =
        reader.deserialize().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["data"], "ABCD");
}

#[test]
fn drop_trailing_run_loses_last_frame() {
    let input = Waveform::new(20)
        .idle(12)
        .frame(&FrameSpec::standard(0x123, &[0xAB, 0xCD]))
        .to_csv(SAMPLE_PERIOD);
    let output = tool!("candecode")
        .arg("--baud=500000")
        .arg("--sample-period=1e-7")
        .arg("--drop-trailing-run")
        .write_stdin(input)
        .captured_output()
        .unwrap();
    assert!(output.status.success());

    let rows = rows(&output.stdout);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["category"], "sof");
}
