use crate::{Annotation, AnnotationKind, Span};

/// One frame recovered from the capture
///
/// Protocol violations don't abort decoding; they're recorded here with the span of the bit where
/// each kind of violation was first observed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CanMessage {
    /// 11-bit identifier, or 29-bit identifier when `extended`
    pub id: u32,
    pub extended: bool,
    pub remote: bool,
    /// As received; values above 8 still carry 8 data bytes
    pub dlc: u8,
    pub data: Vec<u8>,
    /// The 15-bit CRC sequence and the CRC delimiter, MSB first
    pub crc: u16,
    /// Whether some receiver drove the ACK slot dominant
    pub ack: bool,
    /// First sample of the SOF bit
    pub start: usize,
    /// One past the last sample of the last intermission bit
    pub end: usize,

    computed_crc: u16,
    stuffing: Option<Span>,
    end_of_frame: Option<Span>,
    intermission_silence: Option<Span>,
    crc_mismatch: Option<Span>,
}

impl CanMessage {
    pub fn new(start: usize) -> Self {
        Self {
            start,
            end: start,
            ..Default::default()
        }
    }

    /// Number of data bytes on the wire for this DLC and frame type
    #[must_use]
    pub fn data_length(&self) -> usize {
        if self.remote {
            0
        } else {
            usize::from(self.dlc.min(8))
        }
    }

    #[inline]
    #[must_use]
    pub fn crc_sequence(&self) -> u16 {
        self.crc >> 1
    }

    #[inline]
    #[must_use]
    pub fn crc_delimiter(&self) -> bool {
        self.crc & 1 == 1
    }

    /// The CRC-15 calculated over the received SOF, arbitration, control, and data bits
    #[inline]
    #[must_use]
    pub fn computed_crc(&self) -> u16 {
        self.computed_crc
    }

    pub(crate) fn set_computed_crc(&mut self, crc: u16) {
        self.computed_crc = crc;
    }

    pub fn set_stuffing_error(&mut self, bit: Span) {
        self.stuffing.get_or_insert(bit);
    }

    pub fn set_end_of_frame_error(&mut self, bit: Span) {
        self.end_of_frame.get_or_insert(bit);
    }

    pub fn set_intermission_silence_error(&mut self, bit: Span) {
        self.intermission_silence.get_or_insert(bit);
    }

    pub fn set_crc_mismatch(&mut self, field: Span) {
        self.crc_mismatch.get_or_insert(field);
    }

    /// Sample index of the first bit breaking the stuffing rule
    #[must_use]
    pub fn stuffing_error(&self) -> Option<usize> {
        self.stuffing.map(|s| s.start)
    }

    /// Sample index of the first dominant bit in the end-of-frame field
    #[must_use]
    pub fn end_of_frame_error(&self) -> Option<usize> {
        self.end_of_frame.map(|s| s.start)
    }

    /// Sample index of the first dominant bit in the intermission
    #[must_use]
    pub fn intermission_silence_error(&self) -> Option<usize> {
        self.intermission_silence.map(|s| s.start)
    }

    /// Sample index of the start of a CRC field that disagrees with the computed CRC
    #[must_use]
    pub fn crc_mismatch(&self) -> Option<usize> {
        self.crc_mismatch.map(|s| s.start)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.stuffing.is_some()
            || self.end_of_frame.is_some()
            || self.intermission_silence.is_some()
            || self.crc_mismatch.is_some()
    }

    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn error_annotations(&self) -> impl Iterator<Item = Annotation> + '_ {
        let crc_mismatch = AnnotationKind::CrcMismatch {
            received: self.crc_sequence(),
            computed: self.computed_crc,
        };
        [
            (self.stuffing, AnnotationKind::StuffingError),
            (self.end_of_frame, AnnotationKind::EndOfFrameError),
            (
                self.intermission_silence,
                AnnotationKind::IntermissionSilenceError,
            ),
            (self.crc_mismatch, crc_mismatch),
        ]
        .into_iter()
        .filter_map(|(span, kind)| span.map(|span| Annotation::new(span, kind)))
    }
}

impl std::fmt::Display for CanMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:#X}", self.id)?;
        if self.extended {
            write!(f, " EXT")?;
        }
        if self.remote {
            write!(f, " RTR")?;
        }
        write!(f, " [{}]", self.dlc)?;
        if !self.data.is_empty() {
            write!(f, " {}", hex::encode_upper(&self.data))?;
        }
        if !self.ack {
            write!(f, " NACK")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_first_error_wins() {
        let mut message = CanMessage::new(0);
        assert!(!message.has_errors());

        message.set_end_of_frame_error(Span::new(100, 110));
        message.set_end_of_frame_error(Span::new(120, 130));
        assert_eq!(message.end_of_frame_error(), Some(100));

        message.set_stuffing_error(Span::new(40, 50));
        message.set_stuffing_error(Span::new(30, 40));
        assert_eq!(message.stuffing_error(), Some(40));

        assert_eq!(message.intermission_silence_error(), None);
        assert!(message.has_errors());
    }

    #[test]
    fn test_error_annotations_in_kind_order() {
        let mut message = CanMessage::new(0);
        message.set_intermission_silence_error(Span::new(90, 91));
        message.set_stuffing_error(Span::new(12, 13));

        let annotations: Vec<_> = message.error_annotations().collect();
        assert_eq!(
            annotations,
            [
                Annotation::new(Span::new(12, 13), AnnotationKind::StuffingError),
                Annotation::new(Span::new(90, 91), AnnotationKind::IntermissionSilenceError),
            ]
        );
    }

    #[test]
    fn test_data_length() {
        let mut message = CanMessage {
            dlc: 12,
            ..Default::default()
        };
        assert_eq!(message.data_length(), 8);
        message.remote = true;
        assert_eq!(message.data_length(), 0);
    }

    #[test]
    fn test_display() {
        let message = CanMessage {
            id: 0x18FEF100,
            extended: true,
            dlc: 2,
            data: vec![0x01, 0xFF],
            ack: true,
            ..Default::default()
        };
        assert_eq!(message.to_string(), "0x18FEF100 EXT [2] 01FF");

        let message = CanMessage {
            id: 0x7FF,
            remote: true,
            dlc: 8,
            ..Default::default()
        };
        assert_eq!(message.to_string(), "0x7FF RTR [8] NACK");
    }
}
