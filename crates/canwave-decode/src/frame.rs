use crate::{Annotation, AnnotationKind, Bit, CanMessage, Crc15, Destuffer, Span, Stuffing};

/// Consecutive recessive bits (ACK delimiter, EOF, intermission) that prove the bus is idle
const IDLE_BITS: u8 = 11;
const BASE_ID_BITS: u8 = 11;
const EXTENDED_ID_BITS: u8 = 18;
const DLC_BITS: u8 = 4;
/// 15-bit CRC sequence plus the CRC delimiter
const CRC_FIELD_BITS: u8 = 16;
const END_OF_FRAME_BITS: u8 = 7;
const INTERMISSION_BITS: u8 = 3;

/// Where in the bus traffic the next bit belongs
///
/// Counters live in the variant that uses them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameField {
    /// Not yet synchronized; counting recessive bits
    Unknown { recessive: u8 },
    /// Bus idle, waiting for a start-of-frame
    Gap,
    Arbitration { remaining: u8 },
    /// RTR of a standard frame, SRR of an extended one
    ReqRemote,
    ExtendedFrameBit,
    ExtendedArbitration { remaining: u8 },
    RemoteTransmissionBit,
    Reserved1,
    Reserved2,
    Control { position: u8 },
    Data { position: u8, byte: u8 },
    Crc { position: u8 },
    AckBit,
    AckDelimiter,
    EndOfFrame { position: u8 },
    InterFrameSeparation { position: u8 },
}

impl FrameField {
    /// Fields subject to bit stuffing
    fn is_stuffed(self) -> bool {
        matches!(
            self,
            FrameField::Arbitration { .. }
                | FrameField::ReqRemote
                | FrameField::ExtendedFrameBit
                | FrameField::ExtendedArbitration { .. }
                | FrameField::RemoteTransmissionBit
                | FrameField::Reserved1
                | FrameField::Reserved2
                | FrameField::Control { .. }
                | FrameField::Data { .. }
                | FrameField::Crc { .. }
        )
    }
}

/// The frame currently being received
struct OpenFrame {
    message: CanMessage,
    crc: Crc15,
    field_start: usize,
    arbitration_end: usize,
    fields: Option<Vec<Annotation>>,
}

impl OpenFrame {
    fn new(sof: &Bit, field_annotations: bool) -> Self {
        let mut crc = Crc15::default();
        crc.push(sof.value);
        Self {
            message: CanMessage::new(sof.start),
            crc,
            field_start: sof.end,
            arbitration_end: sof.end,
            fields: field_annotations.then(Vec::new),
        }
    }

    fn annotate(&mut self, end: usize, kind: AnnotationKind) {
        if let Some(fields) = &mut self.fields {
            fields.push(Annotation::new(Span::new(self.field_start, end), kind));
        }
    }

    fn annotate_identifier(&mut self, end: usize) {
        self.annotate(
            end,
            AnnotationKind::Identifier {
                id: self.message.id,
                extended: self.message.extended,
            },
        );
    }

    /// Consume one destuffed bit, returning the field the next bit belongs to
    ///
    /// Returns `None` after the last intermission bit.
    fn advance(&mut self, field: FrameField, bit: &Bit) -> Option<FrameField> {
        let value = bit.value;
        let next = match field {
            FrameField::Arbitration { remaining } => {
                if remaining == BASE_ID_BITS {
                    self.field_start = bit.start;
                }
                self.crc.push(value);
                self.message.id = (self.message.id << 1) | u32::from(value);
                if remaining > 1 {
                    FrameField::Arbitration {
                        remaining: remaining - 1,
                    }
                } else {
                    FrameField::ReqRemote
                }
            }
            FrameField::ReqRemote => {
                self.crc.push(value);
                self.message.remote = value;
                self.arbitration_end = bit.end;
                FrameField::ExtendedFrameBit
            }
            FrameField::ExtendedFrameBit => {
                self.crc.push(value);
                self.message.extended = value;
                if value {
                    FrameField::ExtendedArbitration {
                        remaining: EXTENDED_ID_BITS,
                    }
                } else {
                    self.annotate_identifier(self.arbitration_end);
                    FrameField::Reserved2
                }
            }
            FrameField::ExtendedArbitration { remaining } => {
                self.crc.push(value);
                self.message.id = (self.message.id << 1) | u32::from(value);
                if remaining > 1 {
                    FrameField::ExtendedArbitration {
                        remaining: remaining - 1,
                    }
                } else {
                    FrameField::RemoteTransmissionBit
                }
            }
            FrameField::RemoteTransmissionBit => {
                // the bit read as RTR in ReqRemote was the SRR
                self.crc.push(value);
                self.message.remote = value;
                self.annotate_identifier(bit.end);
                FrameField::Reserved1
            }
            FrameField::Reserved1 => {
                self.crc.push(value);
                FrameField::Reserved2
            }
            FrameField::Reserved2 => {
                self.crc.push(value);
                FrameField::Control { position: 0 }
            }
            FrameField::Control { position } => {
                if position == 0 {
                    self.field_start = bit.start;
                }
                self.crc.push(value);
                self.message.dlc = (self.message.dlc << 1) | u8::from(value);
                if position + 1 < DLC_BITS {
                    FrameField::Control {
                        position: position + 1,
                    }
                } else {
                    self.annotate(
                        bit.end,
                        AnnotationKind::Control {
                            dlc: self.message.dlc,
                        },
                    );
                    if self.message.data_length() > 0 {
                        FrameField::Data {
                            position: 0,
                            byte: 0,
                        }
                    } else {
                        FrameField::Crc { position: 0 }
                    }
                }
            }
            FrameField::Data { position, byte } => {
                if position == 0 {
                    self.field_start = bit.start;
                }
                self.crc.push(value);
                let byte = (byte << 1) | u8::from(value);
                if position < 7 {
                    FrameField::Data {
                        position: position + 1,
                        byte,
                    }
                } else {
                    self.message.data.push(byte);
                    self.annotate(bit.end, AnnotationKind::DataByte(byte));
                    if self.message.data.len() < self.message.data_length() {
                        FrameField::Data {
                            position: 0,
                            byte: 0,
                        }
                    } else {
                        FrameField::Crc { position: 0 }
                    }
                }
            }
            FrameField::Crc { position } => {
                if position == 0 {
                    self.field_start = bit.start;
                }
                self.message.crc = (self.message.crc << 1) | u16::from(value);
                if position + 1 < CRC_FIELD_BITS {
                    FrameField::Crc {
                        position: position + 1,
                    }
                } else {
                    self.check_crc(bit.end);
                    FrameField::AckBit
                }
            }
            FrameField::AckBit => {
                self.message.ack = bit.is_dominant();
                self.field_start = bit.start;
                self.annotate(
                    bit.end,
                    AnnotationKind::Ack {
                        acknowledged: self.message.ack,
                    },
                );
                FrameField::AckDelimiter
            }
            FrameField::AckDelimiter => FrameField::EndOfFrame { position: 0 },
            FrameField::EndOfFrame { position } => {
                if bit.is_dominant() {
                    self.message.set_end_of_frame_error(bit.span());
                }
                if position + 1 < END_OF_FRAME_BITS {
                    FrameField::EndOfFrame {
                        position: position + 1,
                    }
                } else {
                    FrameField::InterFrameSeparation { position: 0 }
                }
            }
            FrameField::InterFrameSeparation { position } => {
                if bit.is_dominant() {
                    self.message.set_intermission_silence_error(bit.span());
                }
                if position + 1 < INTERMISSION_BITS {
                    FrameField::InterFrameSeparation {
                        position: position + 1,
                    }
                } else {
                    self.message.end = bit.end;
                    return None;
                }
            }
            FrameField::Unknown { .. } | FrameField::Gap => {
                unreachable!("{field:?} is outside of any frame")
            }
        };
        Some(next)
    }

    fn check_crc(&mut self, end: usize) {
        let computed = self.crc.value();
        self.message.set_computed_crc(computed);
        self.annotate(end, AnnotationKind::Crc(self.message.crc));

        let received = self.message.crc_sequence();
        if received != computed {
            tracing::debug!(
                "CRC mismatch at sample {}: received {received:#06X}, computed {computed:#06X}",
                self.message.start
            );
            self.message.set_crc_mismatch(Span::new(self.field_start, end));
        }
    }

    /// The frame annotation, followed by its field and error annotations in sample order
    fn into_annotations(self) -> Vec<Annotation> {
        let mut details = self.fields.unwrap_or_default();
        details.extend(self.message.error_annotations());
        details.sort_by_key(|a| a.start);

        let mut annotations = Vec::with_capacity(details.len() + 1);
        annotations.push(Annotation::new(
            self.message.span(),
            AnnotationKind::Frame(Box::new(self.message)),
        ));
        annotations.extend(details);
        annotations
    }
}

/// Destuffing and the CAN field state machine, run together one bit at a time
pub struct FrameDecoder {
    field: FrameField,
    destuffer: Destuffer,
    frame: Option<OpenFrame>,
    field_annotations: bool,
    annotations: Vec<Annotation>,
}

impl FrameDecoder {
    /// Create a decoder that hasn't yet synchronized to the bus
    ///
    /// If `field_annotations` is set, sealed frames also produce an annotation per field.
    pub fn new(field_annotations: bool) -> Self {
        Self {
            field: FrameField::Unknown { recessive: 0 },
            destuffer: Destuffer::default(),
            frame: None,
            field_annotations,
            annotations: Vec::new(),
        }
    }

    pub fn push(&mut self, bit: Bit) {
        if self.field.is_stuffed() {
            match self.destuffer.push(bit.value) {
                Stuffing::Data => {}
                Stuffing::StuffBit => {
                    tracing::trace!("Dropping stuff bit at sample {}", bit.start);
                    return;
                }
                Stuffing::Violation => {
                    if let Some(frame) = &mut self.frame {
                        if frame.message.stuffing_error().is_none() {
                            tracing::debug!("Stuffing violation at sample {}", bit.start);
                        }
                        frame.message.set_stuffing_error(bit.span());
                    }
                    return;
                }
            }
        }

        self.field = match self.field {
            FrameField::Unknown { recessive } => {
                if bit.is_dominant() {
                    FrameField::Unknown { recessive: 0 }
                } else if recessive + 1 >= IDLE_BITS {
                    tracing::debug!("Synchronized to bus idle at sample {}", bit.end);
                    FrameField::Gap
                } else {
                    FrameField::Unknown {
                        recessive: recessive + 1,
                    }
                }
            }
            FrameField::Gap => {
                if bit.is_dominant() {
                    self.open_frame(&bit);
                    FrameField::Arbitration {
                        remaining: BASE_ID_BITS,
                    }
                } else {
                    FrameField::Gap
                }
            }
            field => self.advance_frame(field, &bit),
        };
    }

    fn open_frame(&mut self, sof: &Bit) {
        self.annotations
            .push(Annotation::new(sof.span(), AnnotationKind::StartOfFrame));
        self.destuffer.start_of_frame();
        self.frame = Some(OpenFrame::new(sof, self.field_annotations));
    }

    fn advance_frame(&mut self, field: FrameField, bit: &Bit) -> FrameField {
        let Some(frame) = self.frame.as_mut() else {
            // Every in-frame field is entered from Gap, which opens a frame
            tracing::warn!("Lost track of the frame at sample {}; resynchronizing", bit.start);
            return FrameField::Unknown { recessive: 0 };
        };
        if let Some(next) = frame.advance(field, bit) {
            return next;
        }

        if let Some(frame) = self.frame.take() {
            tracing::debug!(
                "Decoded frame {} at samples {}..{}",
                frame.message,
                frame.message.start,
                frame.message.end
            );
            self.annotations.extend(frame.into_annotations());
        }
        FrameField::Gap
    }

    /// Finish decoding, dropping any frame the capture cut short
    pub fn finish(self) -> Vec<Annotation> {
        if let Some(frame) = &self.frame {
            tracing::debug!(
                "Capture ended inside the frame starting at sample {}; dropping it",
                frame.message.start
            );
        }
        self.annotations
    }
}
