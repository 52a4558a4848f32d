//! Parallel computation implementations for min/max reductions

use super::operations::{combine, push, MinMax};
use crate::dtype::Element;
use ndarray::ArrayViewD;
use rayon::prelude::*;

/// Below this many elements a sequential fold is faster than spawning tasks
pub const PARALLEL_THRESHOLD: usize = 1 << 16;

/// Minimum and maximum of a view, skipping NaN values
///
/// Returns `None` for an empty view or one holding only NaN.
pub fn parallel_min_max<T: Element>(data: ArrayViewD<'_, T>) -> Option<MinMax<T>> {
    if data.len() < PARALLEL_THRESHOLD {
        return data.iter().fold(None, |acc, &v| push(acc, v));
    }
    data.into_par_iter()
        .fold(|| None, |acc, &v| push(acc, v))
        .reduce(|| None, combine)
}
