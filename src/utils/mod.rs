//! Math utilities: squashing function and label readout helpers.

/// Logistic sigmoid: `1 / (1 + e^-x)`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Index of the largest value, earliest index on ties.
///
/// A later element only wins if it is strictly greater than the current
/// best, so `[0.5, 0.5]` yields `0`. Returns `None` for an empty slice.
/// NaN never wins.
pub fn argmax_first<'a, I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut iter = values.into_iter().enumerate();
    let (_, first) = iter.next()?;
    let (best, _) = iter.fold((0, *first), |(best, best_val), (i, &v)| {
        if v > best_val {
            (i, v)
        } else {
            (best, best_val)
        }
    });
    Some(best)
}
