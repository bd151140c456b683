use ordered_float::OrderedFloat;

/// Below this interquartile range (in volts) the capture doesn't separate into two logic levels
pub const MIN_INTERQUARTILE_RANGE: f32 = 0.6;

/// Calculate `CAN_H[i] - CAN_L[i]` for every sample
pub fn differential(can_h: &[f32], can_l: &[f32]) -> eyre::Result<Vec<f32>> {
    if can_h.len() != can_l.len() {
        eyre::bail!(
            "CAN_H has {} samples but CAN_L has {}; captures must be the same length",
            can_h.len(),
            can_l.len()
        );
    }
    let mut diff = vec![0.0; can_h.len()];
    for (d, (h, l)) in diff.iter_mut().zip(can_h.iter().zip(can_l)) {
        *d = h - l;
    }
    Ok(diff)
}

/// The dominant/recessive decision level of a capture
///
/// Edges overshoot and undershoot, so the min and max make poor level estimates. The quartiles of
/// the differential signal ignore those outliers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Threshold {
    pub q1: f32,
    pub q3: f32,
    pub level: f32,
}

impl Threshold {
    /// Estimate from the quartiles at ranks `ceil(n/4)` and `ceil(3n/4)`
    ///
    /// Returns `None` for an empty capture.
    pub fn estimate(differential: &[f32]) -> Option<Self> {
        if differential.is_empty() {
            return None;
        }
        let mut sorted: Vec<OrderedFloat<f32>> =
            differential.iter().copied().map(OrderedFloat).collect();
        sorted.sort_unstable();

        let n = sorted.len();
        let q1 = sorted[n.div_ceil(4).min(n - 1)].0;
        let q3 = sorted[(3 * n).div_ceil(4).min(n - 1)].0;
        let threshold = Self {
            q1,
            q3,
            level: q1 + (q3 - q1) / 2.0,
        };
        tracing::debug!(
            "Estimated threshold {:.3}V from Q1={q1:.3}V Q3={q3:.3}V over {n} samples",
            threshold.level
        );
        Some(threshold)
    }

    #[inline]
    #[must_use]
    pub fn interquartile_range(&self) -> f32 {
        self.q3 - self.q1
    }

    /// Whether the capture has two distinguishable bus levels
    #[inline]
    #[must_use]
    pub fn separates_levels(&self) -> bool {
        self.interquartile_range() >= MIN_INTERQUARTILE_RANGE
    }

    /// Differential values below the level are recessive (logical 1)
    ///
    /// A NaN sample can't be a driven bus, so it's recessive too.
    #[inline]
    #[must_use]
    pub fn is_recessive(&self, differential: f32) -> bool {
        differential < self.level || differential.is_nan()
    }
}
