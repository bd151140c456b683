use crate::{
    Annotation, Baud, BitExtractor, FrameDecoder, MIN_INTERQUARTILE_RANGE, Threshold,
    TrailingRun, differential,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub baud: Baud,
    pub trailing_run: TrailingRun,
    /// Also annotate the identifier, control, data, CRC, and ACK fields of each frame
    pub field_annotations: bool,
}

/// Decode every CAN frame in a pair of CAN_H/CAN_L captures
///
/// `sample_period` is the time between samples, in seconds. Annotations are returned in the order
/// they're found: a SOF annotation as soon as a frame starts, then the frame and its details once
/// the frame's intermission has been received. A capture whose levels can't be told apart decodes
/// to nothing.
pub fn decode(
    can_h: &[f32],
    can_l: &[f32],
    sample_period: f64,
    options: &DecodeOptions,
) -> eyre::Result<Vec<Annotation>> {
    if !sample_period.is_finite() || sample_period <= 0.0 {
        eyre::bail!("Sample period must be a positive number of seconds, not {sample_period}");
    }
    let differential = differential(can_h, can_l)?;

    let Some(threshold) = Threshold::estimate(&differential) else {
        tracing::debug!("Empty capture");
        return Ok(Vec::new());
    };
    if !threshold.separates_levels() {
        tracing::warn!(
            "Interquartile range {:.3}V is below {MIN_INTERQUARTILE_RANGE}V; no bus levels",
            threshold.interquartile_range()
        );
        return Ok(Vec::new());
    }

    let bit_time = options.baud.bit_time();
    let samples_per_bit = bit_time / sample_period;
    tracing::debug!(
        "Decoding {} samples at {} baud ({samples_per_bit:.1} samples per bit)",
        differential.len(),
        options.baud
    );
    if samples_per_bit < 2.0 {
        tracing::warn!(
            "Only {samples_per_bit:.2} samples per bit at {} baud; bits will be lost",
            options.baud
        );
    }

    let mut decoder = FrameDecoder::new(options.field_annotations);
    let bits = BitExtractor::new(
        &differential,
        threshold,
        bit_time,
        sample_period,
        options.trailing_run,
    );
    for bit in bits {
        decoder.push(bit);
    }
    Ok(decoder.finish())
}
