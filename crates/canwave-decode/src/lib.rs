//! Decode CAN 2.0A/B frames from analog CAN_H/CAN_L captures
//!
//! The pipeline is differential signal → [Threshold] → [BitExtractor] → [FrameDecoder] →
//! [Annotation]s, where the frame decoder runs destuffing and the field state machine together,
//! bit by bit. See [decode()].
mod annotation;
mod baud;
mod bits;
pub mod capture;
mod crc;
mod decoder;
mod destuff;
mod frame;
mod message;
pub mod stdio;
mod threshold;

pub use annotation::{Annotation, AnnotationKind, AnnotationRecord, Span};
pub use baud::Baud;
pub use bits::{Bit, BitExtractor, TrailingRun};
pub use crc::Crc15;
pub use decoder::{DecodeOptions, decode};
pub use destuff::{Destuffer, Stuffing};
pub use frame::FrameDecoder;
pub use message::CanMessage;
pub use threshold::{MIN_INTERQUARTILE_RANGE, Threshold, differential};

#[cfg(test)]
#[ctor::ctor]
fn setup_test_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .with_ansi(true)
        .init();
}
