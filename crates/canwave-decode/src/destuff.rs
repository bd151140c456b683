/// Longest run of identical bits a transmitter may put on the wire before stuffing
const MAX_RUN: u8 = 5;

/// What a bit turned out to be once the stuffing rule was applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stuffing {
    /// A bit of the frame proper
    Data,
    /// The opposite bit inserted after five identical bits; carries no data
    StuffBit,
    /// Sixth (or later) identical bit in a row
    Violation,
}

/// Removes stuff bits from the region of a frame that's stuffed (SOF through the CRC)
///
/// `run` is the length of the current run of identical bits, counting stuff bits, since the
/// stuff bit is the first bit of the run that follows it.
#[derive(Clone, Debug, Default)]
pub struct Destuffer {
    run: u8,
    last: bool,
}

impl Destuffer {
    /// Restart counting at a (dominant) start-of-frame bit
    pub fn start_of_frame(&mut self) {
        self.run = 1;
        self.last = false;
    }

    pub fn push(&mut self, value: bool) -> Stuffing {
        if value == self.last {
            self.run = self.run.saturating_add(1);
            if self.run > MAX_RUN {
                return Stuffing::Violation;
            }
            return Stuffing::Data;
        }

        let after_full_run = self.run == MAX_RUN;
        self.run = 1;
        self.last = value;
        if after_full_run {
            Stuffing::StuffBit
        } else {
            Stuffing::Data
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn destuff(bits: &[bool]) -> Vec<Stuffing> {
        let mut destuffer = Destuffer::default();
        destuffer.start_of_frame();
        bits.iter().map(|b| destuffer.push(*b)).collect()
    }

    #[test]
    fn test_bit_after_five_is_stuffing() {
        // SOF + 4 more dominant bits make a run of five
        let results = destuff(&[false, false, false, false, true, false]);
        assert_eq!(
            results,
            [
                Stuffing::Data,
                Stuffing::Data,
                Stuffing::Data,
                Stuffing::Data,
                Stuffing::StuffBit,
                Stuffing::Data,
            ]
        );
    }

    #[test]
    fn test_sixth_identical_bit_is_a_violation() {
        let results = destuff(&[false, false, false, false, false, false, true]);
        assert_eq!(
            results,
            [
                Stuffing::Data,
                Stuffing::Data,
                Stuffing::Data,
                Stuffing::Data,
                Stuffing::Violation,
                Stuffing::Violation,
                Stuffing::Data,
            ]
        );
    }

    #[test]
    fn test_stuff_bit_counts_towards_next_run() {
        let mut destuffer = Destuffer::default();
        destuffer.start_of_frame();
        for _ in 0..4 {
            assert_eq!(destuffer.push(false), Stuffing::Data);
        }
        // stuff bit, then four more recessive bits complete a run of five
        assert_eq!(destuffer.push(true), Stuffing::StuffBit);
        for _ in 0..4 {
            assert_eq!(destuffer.push(true), Stuffing::Data);
        }
        assert_eq!(destuffer.push(false), Stuffing::StuffBit);
    }

    #[test]
    fn test_shorter_runs_pass_through() {
        let bits = [true, true, false, true, false, false, false, true];
        assert!(destuff(&bits).iter().all(|s| *s == Stuffing::Data));
    }
}
