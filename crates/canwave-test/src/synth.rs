//! Synthesize CAN_H/CAN_L captures of well-formed (or deliberately broken) CAN frames
//!
//! Logic levels follow the bus convention: `true` is recessive (logical 1), `false` is dominant.
use std::fmt::Write;

/// `(CAN_H, CAN_L)` voltages of an idle bus
pub const RECESSIVE: (f32, f32) = (2.5, 2.5);
/// `(CAN_H, CAN_L)` voltages while a node drives the bus
pub const DOMINANT: (f32, f32) = (3.5, 1.5);

const CRC15_POLYNOMIAL: u16 = 0x4599;

/// What to put on the wire
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSpec {
    pub id: u32,
    pub extended: bool,
    pub remote: bool,
    /// Overrides the DLC derived from the data length
    pub dlc: Option<u8>,
    pub data: Vec<u8>,
    /// Whether some receiver drives the ACK slot dominant
    pub ack: bool,
    /// Overrides the computed CRC sequence
    pub crc: Option<u16>,
}

impl FrameSpec {
    pub fn standard(id: u32, data: &[u8]) -> Self {
        Self {
            id: id & 0x7FF,
            data: data.to_vec(),
            ack: true,
            ..Default::default()
        }
    }

    pub fn extended(id: u32, data: &[u8]) -> Self {
        Self {
            id: id & 0x1FFF_FFFF,
            extended: true,
            data: data.to_vec(),
            ack: true,
            ..Default::default()
        }
    }

    /// A remote frame requesting `dlc` bytes
    pub fn remote(mut self, dlc: u8) -> Self {
        self.remote = true;
        self.dlc = Some(dlc);
        self.data.clear();
        self
    }

    /// Transmit a wrong CRC sequence
    pub fn with_crc(mut self, crc: u16) -> Self {
        self.crc = Some(crc & 0x7FFF);
        self
    }

    pub fn without_ack(mut self) -> Self {
        self.ack = false;
        self
    }

    #[must_use]
    pub fn dlc(&self) -> u8 {
        self.dlc.unwrap_or(self.data.len() as u8)
    }
}

/// The physical bits of one frame, stuffed, from SOF through the intermission
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedFrame {
    pub bits: Vec<bool>,
}

impl EncodedFrame {
    /// Offset of the ACK slot
    #[must_use]
    pub fn ack_slot(&self) -> usize {
        self.bits.len() - 12
    }

    /// Offset of the first of the seven end-of-frame bits
    #[must_use]
    pub fn end_of_frame(&self) -> usize {
        self.bits.len() - 10
    }

    /// Offset of the first of the three intermission bits
    #[must_use]
    pub fn intermission(&self) -> usize {
        self.bits.len() - 3
    }
}

fn push_msb_first(bits: &mut Vec<bool>, value: u32, width: u32) {
    for shift in (0..width).rev() {
        bits.push((value >> shift) & 1 == 1);
    }
}

/// Bit-serial CRC-15/CAN over the given logic levels
#[must_use]
pub fn crc15(bits: &[bool]) -> u16 {
    let mut crc: u16 = 0;
    for &bit in bits {
        let feedback = bit ^ ((crc >> 14) & 1 == 1);
        crc = (crc << 1) & 0x7FFF;
        if feedback {
            crc ^= CRC15_POLYNOMIAL;
        }
    }
    crc
}

/// Insert an opposite bit after every run of five identical bits
///
/// Stuff bits count towards the run that follows them.
#[must_use]
pub fn stuff(bits: &[bool]) -> Vec<bool> {
    let mut stuffed = Vec::with_capacity(bits.len() + bits.len() / 4);
    let mut last = None;
    let mut run = 0;
    for &bit in bits {
        stuffed.push(bit);
        if last == Some(bit) {
            run += 1;
        } else {
            last = Some(bit);
            run = 1;
        }
        if run == 5 {
            stuffed.push(!bit);
            last = Some(!bit);
            run = 1;
        }
    }
    stuffed
}

/// Encode a CAN 2.0A/B frame with a correct CRC and bit stuffing
#[must_use]
pub fn encode_frame(spec: &FrameSpec) -> EncodedFrame {
    let mut bits = vec![false];
    if spec.extended {
        push_msb_first(&mut bits, spec.id >> 18, 11);
        bits.push(true); // SRR
        bits.push(true); // IDE
        push_msb_first(&mut bits, spec.id & 0x3FFFF, 18);
        bits.push(spec.remote); // RTR
        bits.push(false); // r1
        bits.push(false); // r0
    } else {
        push_msb_first(&mut bits, spec.id, 11);
        bits.push(spec.remote); // RTR
        bits.push(false); // IDE
        bits.push(false); // r0
    }
    push_msb_first(&mut bits, u32::from(spec.dlc()), 4);
    if !spec.remote {
        for byte in &spec.data {
            push_msb_first(&mut bits, u32::from(*byte), 8);
        }
    }
    let crc = spec.crc.unwrap_or_else(|| crc15(&bits));
    push_msb_first(&mut bits, u32::from(crc), 15);

    let mut bits = stuff(&bits);
    bits.push(true); // CRC delimiter
    bits.push(!spec.ack);
    bits.push(true); // ACK delimiter
    bits.extend([true; 7]);
    bits.extend([true; 3]);
    EncodedFrame { bits }
}

/// A sequence of logic levels rendered as ideal square CAN_H/CAN_L waveforms
#[derive(Clone, Debug)]
pub struct Waveform {
    samples_per_bit: usize,
    bits: Vec<bool>,
}

impl Waveform {
    pub fn new(samples_per_bit: usize) -> Self {
        Self {
            samples_per_bit,
            bits: Vec::new(),
        }
    }

    /// Append `count` recessive bits
    pub fn idle(mut self, count: usize) -> Self {
        self.bits.extend(std::iter::repeat_n(true, count));
        self
    }

    pub fn frame(self, spec: &FrameSpec) -> Self {
        self.encoded(&encode_frame(spec))
    }

    pub fn encoded(self, frame: &EncodedFrame) -> Self {
        self.bits(&frame.bits)
    }

    /// Append raw logic levels, with no stuffing applied
    pub fn bits(mut self, bits: &[bool]) -> Self {
        self.bits.extend_from_slice(bits);
        self
    }

    /// Number of bits appended so far
    #[must_use]
    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    /// Sample index at which the given bit starts
    #[must_use]
    pub fn sample_of(&self, bit: usize) -> usize {
        bit * self.samples_per_bit
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample_of(self.bits.len())
    }

    /// Render as `(CAN_H, CAN_L)`
    #[must_use]
    pub fn signals(&self) -> (Vec<f32>, Vec<f32>) {
        let mut can_h = Vec::with_capacity(self.sample_count());
        let mut can_l = Vec::with_capacity(self.sample_count());
        for &bit in &self.bits {
            let (h, l) = if bit { RECESSIVE } else { DOMINANT };
            can_h.extend(std::iter::repeat_n(h, self.samples_per_bit));
            can_l.extend(std::iter::repeat_n(l, self.samples_per_bit));
        }
        (can_h, can_l)
    }

    /// Render as a `time,CAN_H,CAN_L` CSV with a header
    #[must_use]
    pub fn to_csv(&self, sample_period: f64) -> String {
        let (can_h, can_l) = self.signals();
        let mut csv = String::from("time,CAN_H,CAN_L\n");
        for (index, (h, l)) in can_h.iter().zip(&can_l).enumerate() {
            let time = index as f64 * sample_period;
            // writing to a String can't fail
            let _ = writeln!(csv, "{time:.9},{h},{l}");
        }
        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stuff_after_five() {
        let bits = [false, false, false, false, false, false, true];
        let stuffed = stuff(&bits);
        assert_eq!(
            stuffed,
            [false, false, false, false, false, true, false, true]
        );
    }

    #[test]
    fn test_stuff_bit_starts_next_run() {
        // 5 zeros, stuffed one, then 4 ones make a run of five with the stuff bit
        let bits = [false, false, false, false, false, true, true, true, true];
        let stuffed = stuff(&bits);
        assert_eq!(
            stuffed,
            [
                false, false, false, false, false, true, true, true, true, true, false
            ]
        );
    }

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(&FrameSpec::standard(0x123, &[0xAB, 0xCD]));
        assert!(!frame.bits[0], "SOF is dominant");
        assert!(!frame.bits[frame.ack_slot()], "ACK slot driven");
        assert!(frame.bits[frame.end_of_frame()..].iter().all(|b| *b));
    }

    #[test]
    fn test_waveform_samples() {
        let wave = Waveform::new(4).idle(1).bits(&[false]);
        let (can_h, can_l) = wave.signals();
        assert_eq!(can_h, [2.5, 2.5, 2.5, 2.5, 3.5, 3.5, 3.5, 3.5]);
        assert_eq!(can_l, [2.5, 2.5, 2.5, 2.5, 1.5, 1.5, 1.5, 1.5]);
        assert_eq!(wave.sample_of(1), 4);
    }
}
