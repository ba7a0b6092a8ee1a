/// How a modification point is drawn within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
    /// Uniform over all points.
    Random,

    /// Proportional to the weights set for the file. A file without weights
    /// degrades to uniform selection instead of failing.
    Weighted,
}

/// Uniform index into `0..len`. `len` must be positive.
pub(crate) fn uniform_index(rng: &mut fastrand::Rng, len: usize) -> usize {
    debug_assert!(len > 0);
    rng.usize(0..len)
}

/// Index drawn with probability proportional to its weight.
///
/// Weights must be non-negative with a positive sum; an index with zero
/// weight is never returned.
pub(crate) fn weighted_index(rng: &mut fastrand::Rng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    debug_assert!(total > 0.0);

    let roll = rng.f64() * total;
    let mut cumulative = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if roll < cumulative {
            return index;
        }
    }

    // Accumulating in a different order than `total` can leave `roll` at or
    // past the final cumulative sum by a rounding error.
    weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)
}
