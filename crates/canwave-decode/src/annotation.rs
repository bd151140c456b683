use serde::ser::SerializeStruct;

use crate::CanMessage;

/// A half-open `[start, end)` range of sample indices
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[inline]
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationKind {
    /// The dominant bit that opens a frame
    StartOfFrame,
    /// A completed frame, from SOF through the last intermission bit
    Frame(Box<CanMessage>),

    Identifier { id: u32, extended: bool },
    Control { dlc: u8 },
    DataByte(u8),
    /// The 15-bit CRC sequence followed by the CRC delimiter
    Crc(u16),
    Ack { acknowledged: bool },

    StuffingError,
    EndOfFrameError,
    IntermissionSilenceError,
    CrcMismatch { received: u16, computed: u16 },
}

/// One labelled region of the capture
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    pub kind: AnnotationKind,
}

impl Annotation {
    #[inline]
    #[must_use]
    pub fn new(span: Span, kind: AnnotationKind) -> Self {
        Self {
            start: span.start,
            end: span.end,
            kind,
        }
    }

    #[inline]
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Coarse grouping for consumers that style or filter annotations
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self.kind {
            AnnotationKind::StartOfFrame => "sof",
            AnnotationKind::Frame(_) => "frame",
            AnnotationKind::Identifier { .. }
            | AnnotationKind::Control { .. }
            | AnnotationKind::DataByte(_)
            | AnnotationKind::Crc(_)
            | AnnotationKind::Ack { .. } => "field",
            AnnotationKind::StuffingError
            | AnnotationKind::EndOfFrameError
            | AnnotationKind::IntermissionSilenceError
            | AnnotationKind::CrcMismatch { .. } => "error",
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.category() == "error"
    }

    #[must_use]
    pub fn message(&self) -> Option<&CanMessage> {
        match &self.kind {
            AnnotationKind::Frame(message) => Some(message),
            _ => None,
        }
    }
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.kind {
            AnnotationKind::StartOfFrame => write!(f, "SOF"),
            AnnotationKind::Frame(message) => write!(f, "{message}"),
            AnnotationKind::Identifier { id, extended } => {
                if *extended {
                    write!(f, "ID {id:#010X}")
                } else {
                    write!(f, "ID {id:#05X}")
                }
            }
            AnnotationKind::Control { dlc } => write!(f, "DLC {dlc}"),
            AnnotationKind::DataByte(byte) => write!(f, "{byte:#04X}"),
            AnnotationKind::Crc(crc) => write!(f, "CRC {:#06X}", crc >> 1),
            AnnotationKind::Ack { acknowledged: true } => write!(f, "ACK"),
            AnnotationKind::Ack {
                acknowledged: false,
            } => write!(f, "NACK"),
            AnnotationKind::StuffingError => write!(f, "Stuffing error"),
            AnnotationKind::EndOfFrameError => write!(f, "End of frame error"),
            AnnotationKind::IntermissionSilenceError => write!(f, "Intermission error"),
            AnnotationKind::CrcMismatch { received, computed } => write!(
                f,
                "CRC mismatch: received {received:#06X}, computed {computed:#06X}"
            ),
        }
    }
}

/// An [Annotation] paired with the capture's sample period, for CSV output
pub struct AnnotationRecord<'a> {
    pub annotation: &'a Annotation,
    pub sample_period: f64,
}

impl serde::Serialize for AnnotationRecord<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let annotation = self.annotation;
        let message = annotation.message();

        let mut state = serializer.serialize_struct("AnnotationRecord", 16)?;
        state.serialize_field("start", &annotation.start)?;
        state.serialize_field("end", &annotation.end)?;
        state.serialize_field(
            "start_time",
            &(annotation.start as f64 * self.sample_period),
        )?;
        state.serialize_field("category", annotation.category())?;
        state.serialize_field("label", &annotation.to_string())?;
        state.serialize_field("canid", &message.map(|m| format!("{:#X}", m.id)))?;
        state.serialize_field("extended", &message.map(|m| m.extended))?;
        state.serialize_field("remote", &message.map(|m| m.remote))?;
        state.serialize_field("dlc", &message.map(|m| m.dlc))?;
        state.serialize_field("data", &message.map(|m| hex::encode_upper(&m.data)))?;
        state.serialize_field("crc", &message.map(|m| format!("{:#X}", m.crc_sequence())))?;
        state.serialize_field("ack", &message.map(|m| m.ack))?;
        state.serialize_field("stuffing_error", &message.and_then(|m| m.stuffing_error()))?;
        state.serialize_field("eof_error", &message.and_then(|m| m.end_of_frame_error()))?;
        state.serialize_field(
            "intermission_error",
            &message.and_then(|m| m.intermission_silence_error()),
        )?;
        state.serialize_field("crc_error", &message.and_then(|m| m.crc_mismatch()))?;
        state.end()
    }
}
