//! Sampled contrast limits
//!
//! Display ranges are estimated from a bounded random sample instead of a full
//! scan, which keeps opening large stacks responsive:
//!
//! - 2D arrays: `num_samples` random `(row, col)` points, drawn with replacement
//! - 3D and up: `num_samples` distinct slices along an axis, read in index order
//!
//! Unsigned arrays always get a lower limit of 0. Passing `None` as the sample
//! count makes the estimate exhaustive.

use super::operations::MinMaxReduction;
use crate::array::check_axis;
use crate::data_source::LoadedArray;
use crate::dtype::Scalar;
use crate::errors::{MatImagesError, Result};
use rand::seq::index;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

/// Default number of points (2D) or slices (3D and up) sampled per estimate
pub const DEFAULT_CONTRAST_SAMPLES: usize = 100;

/// Display range of one record: a single pair, or one pair per channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContrastLimits {
    Single([Scalar; 2]),
    PerChannel(Vec<[Scalar; 2]>),
}

impl ContrastLimits {
    /// Number of `[min, max]` pairs
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ContrastLimits::Single(_) => 1,
            ContrastLimits::PerChannel(limits) => limits.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All pairs in channel order
    #[must_use]
    pub fn pairs(&self) -> Vec<[Scalar; 2]> {
        match self {
            ContrastLimits::Single(pair) => vec![*pair],
            ContrastLimits::PerChannel(limits) => limits.clone(),
        }
    }
}

/// Estimate `[min, max]` of an array with at least two dimensions
///
/// `axis` is the slice axis sampled for arrays with three or more dimensions and
/// is ignored for 2D arrays. Results keep the array's element type. Lazy arrays
/// are forced here, reading only the sampled points or slices.
///
/// # Errors
///
/// Returns a `ShapeError` for arrays with fewer than two dimensions or an invalid
/// axis, and propagates storage read failures.
pub fn estimate<R: Rng + ?Sized>(
    array: &LoadedArray,
    axis: usize,
    num_samples: Option<usize>,
    rng: &mut R,
) -> Result<[Scalar; 2]> {
    let shape = array.shape();
    let bounds = match shape.len() {
        0 | 1 => {
            return Err(MatImagesError::shape(format!(
                "Contrast estimation needs at least 2 dimensions, got shape {:?}",
                shape
            )))
        }
        2 => {
            let size = shape[0].saturating_mul(shape[1]);
            let n = num_samples.map_or(size, |n| n.min(size));
            if n == 0 {
                None
            } else {
                let points: Vec<Vec<usize>> = (0..n)
                    .map(|_| vec![rng.gen_range(0..shape[0]), rng.gen_range(0..shape[1])])
                    .collect();
                debug!(points = n, "sampling 2D contrast");
                array.gather(&points)?.min_max()?
            }
        }
        _ => {
            check_axis(axis, shape.len())?;
            let len = shape[axis];
            let n = num_samples.map_or(len, |n| n.min(len));
            let mut indices = index::sample(rng, len, n).into_vec();
            indices.sort_unstable();
            debug!(axis, slices = n, of = len, "sampling slice contrast");
            array.min_max_of_slices(axis, &indices)?
        }
    };

    // A sample can miss every comparable value of a mostly-NaN image
    let bounds = match bounds {
        Some(bounds) => Some(bounds),
        None => {
            debug!(shape = ?shape, "sample held only NaN, scanning the whole array");
            array.min_max()?
        }
    };
    let dtype = array.dtype();
    let [min, max] = bounds.unwrap_or_else(|| [Scalar::undefined(dtype); 2]);
    let min = if dtype.is_unsigned() { Scalar::zero(dtype) } else { min };
    Ok([min, max])
}

/// Estimate limits independently for every index along `channel_axis`
///
/// Each channel slice is sampled along its first axis. Pairs come back in
/// channel order.
///
/// # Errors
///
/// Same as [`estimate`], applied to each channel slice.
pub fn estimate_channels<R: Rng + ?Sized>(
    array: &LoadedArray,
    channel_axis: usize,
    num_samples: Option<usize>,
    rng: &mut R,
) -> Result<Vec<[Scalar; 2]>> {
    check_axis(channel_axis, array.ndim())?;
    (0..array.shape()[channel_axis])
        .map(|channel| {
            let slice = array.index_axis(channel_axis, channel)?;
            estimate(&slice, 0, num_samples, rng)
        })
        .collect()
}
