use crate::{Span, Threshold};

/// Runs may be up to 4% longer than their nominal length without gaining a bit
const JITTER_TOLERANCE: f64 = 0.04;
/// Edges are only known to within a sample, so a run may always be one sample long
const MIN_SLACK_SAMPLES: f64 = 1.0;
/// Keeps a run that lands exactly on a bit boundary from rounding up to another bit
const BOUNDARY_EPSILON: f64 = 1e-9;

/// One logical bit recovered from the capture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bit {
    pub start: usize,
    /// Exclusive
    pub end: usize,
    /// Logic level: `true` is recessive (logical 1), `false` is dominant (logical 0)
    pub value: bool,
}

impl Bit {
    #[inline]
    #[must_use]
    pub fn is_dominant(&self) -> bool {
        !self.value
    }

    #[inline]
    #[must_use]
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// What to do with the run of samples after the last edge of the capture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrailingRun {
    /// Close the final run at the end of the capture and decode its bits
    ///
    /// The end of the last frame (ACK delimiter, EOF, intermission) is always part of the
    /// recessive run that lasts until the end of the capture.
    #[default]
    Flush,
    /// Stop at the last edge, discarding the final run
    Drop,
}

/// The bits of one run, handed out one at a time
#[derive(Clone, Copy, Debug)]
struct Partition {
    next_start: usize,
    end: usize,
    samples_per_bit: usize,
    remaining: usize,
    value: bool,
}

impl Iterator for Partition {
    type Item = Bit;

    fn next(&mut self) -> Option<Bit> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        // The last bit absorbs the rounding remainder
        let end = if self.remaining == 0 {
            self.end
        } else {
            self.next_start + self.samples_per_bit
        };
        let bit = Bit {
            start: self.next_start,
            end,
            value: self.value,
        };
        self.next_start = end;
        Some(bit)
    }
}

/// Clock recovery: split runs of samples on one side of the threshold into bits
///
/// Each run between two edges is `ceil((samples - slack) / samples_per_bit)` bits long, where the
/// slack is 4% of the run but at least one sample. The iterator is lazy and walks the capture once.
pub struct BitExtractor<'a> {
    differential: &'a [f32],
    threshold: Threshold,
    bit_time: f64,
    sample_period: f64,
    trailing_run: TrailingRun,

    cursor: usize,
    run_start: usize,
    run_value: bool,
    partition: Option<Partition>,
}

impl<'a> BitExtractor<'a> {
    pub fn new(
        differential: &'a [f32],
        threshold: Threshold,
        bit_time: f64,
        sample_period: f64,
        trailing_run: TrailingRun,
    ) -> Self {
        let run_value = differential
            .first()
            .is_some_and(|d| threshold.is_recessive(*d));
        Self {
            differential,
            threshold,
            bit_time,
            sample_period,
            trailing_run,
            cursor: 1,
            run_start: 0,
            run_value,
            partition: None,
        }
    }

    /// How many bits a run of `samples` samples holds
    fn bits_in_run(&self, samples: usize) -> usize {
        let samples_per_bit = self.bit_time / self.sample_period;
        let run = samples as f64;
        let slack = (run * JITTER_TOLERANCE).max(MIN_SLACK_SAMPLES);
        let bits = ((run - slack) / samples_per_bit - BOUNDARY_EPSILON).ceil() as usize;
        // Never hand out empty bits, even if the capture is sampled slower than the bit rate
        bits.clamp(1, samples)
    }

    fn close_run(&mut self, end: usize) -> Partition {
        let samples = end - self.run_start;
        let count = self.bits_in_run(samples);
        let partition = Partition {
            next_start: self.run_start,
            end,
            samples_per_bit: samples / count,
            remaining: count,
            value: self.run_value,
        };
        self.run_start = end;
        partition
    }
}

impl Iterator for BitExtractor<'_> {
    type Item = Bit;

    fn next(&mut self) -> Option<Bit> {
        loop {
            if let Some(bit) = self.partition.as_mut().and_then(Iterator::next) {
                return Some(bit);
            }
            self.partition = None;

            let Some(&sample) = self.differential.get(self.cursor) else {
                let len = self.differential.len();
                if self.trailing_run == TrailingRun::Flush && self.run_start < len {
                    self.partition = Some(self.close_run(len));
                    continue;
                }
                return None;
            };
            let index = self.cursor;
            self.cursor += 1;

            let value = self.threshold.is_recessive(sample);
            if value != self.run_value {
                self.partition = Some(self.close_run(index));
                self.run_value = value;
            }
        }
    }
}
