//! Core min/max reductions and traits
//!
//! Extrema are computed in the array's own element type and skip NaN values.
//! Eager buffers are folded in parallel; lazy arrays are streamed block by block
//! so the full array is never materialized.

use crate::array::{dispatch, DynArray};
use crate::data_source::LoadedArray;
use crate::dtype::{Element, Scalar};
use crate::errors::{MatImagesError, Result};
use crate::lazy::LazyArray;
use ndarray::Axis;

/// Running minimum and maximum of a set of values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax<T> {
    pub min: T,
    pub max: T,
}

impl<T: Element> MinMax<T> {
    #[must_use]
    pub fn of(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            min: if other.min < self.min { other.min } else { self.min },
            max: if other.max > self.max { other.max } else { self.max },
        }
    }

    /// Type-erased `[min, max]`
    #[must_use]
    pub fn to_scalars(&self) -> [Scalar; 2] {
        [self.min.into_scalar(), self.max.into_scalar()]
    }
}

/// NaN is the only value not ordered against itself
#[inline]
fn is_nan<T: PartialOrd>(value: &T) -> bool {
    value.partial_cmp(value).is_none()
}

/// Fold one value into a running extremum, skipping NaN
#[inline]
pub fn push<T: Element>(acc: Option<MinMax<T>>, value: T) -> Option<MinMax<T>> {
    if is_nan(&value) {
        return acc;
    }
    Some(match acc {
        Some(current) => current.merge(MinMax::of(value)),
        None => MinMax::of(value),
    })
}

/// Combine two partial results
#[inline]
pub fn combine<T: Element>(a: Option<MinMax<T>>, b: Option<MinMax<T>>) -> Option<MinMax<T>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.merge(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Trait for arrays that can report their extrema
pub trait MinMaxReduction {
    /// `[min, max]` over every non-NaN element, `None` if there is none
    ///
    /// # Errors
    ///
    /// Propagates storage read failures of lazy arrays.
    fn min_max(&self) -> Result<Option<[Scalar; 2]>>;

    /// Extrema over the slices at `indices` along `axis`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` for an invalid axis or index and propagates
    /// storage read failures.
    fn min_max_of_slices(&self, axis: usize, indices: &[usize]) -> Result<Option<[Scalar; 2]>>;
}

impl MinMaxReduction for DynArray {
    fn min_max(&self) -> Result<Option<[Scalar; 2]>> {
        Ok(dispatch!(self, a => {
            super::parallel::parallel_min_max(a.view()).map(|m| m.to_scalars())
        }))
    }

    fn min_max_of_slices(&self, axis: usize, indices: &[usize]) -> Result<Option<[Scalar; 2]>> {
        crate::array::check_axis(axis, self.ndim())?;
        let len = self.shape()[axis];
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(MatImagesError::shape(format!(
                "Index {bad} out of bounds for axis {axis} of length {len}"
            )));
        }
        Ok(dispatch!(self, a => {
            indices
                .iter()
                .map(|&i| super::parallel::parallel_min_max(a.index_axis(Axis(axis), i)))
                .fold(None, combine)
                .map(|m| m.to_scalars())
        }))
    }
}

impl MinMaxReduction for LazyArray {
    fn min_max(&self) -> Result<Option<[Scalar; 2]>> {
        crate::with_dtype!(self.dtype(), T => {
            let mut acc: Option<MinMax<T>> = None;
            self.for_each_block(|block| {
                let block = block.into_typed::<T>()?;
                acc = combine(acc, super::parallel::parallel_min_max(block.view()));
                Ok(())
            })?;
            Ok(acc.map(|m| m.to_scalars()))
        })
    }

    fn min_max_of_slices(&self, axis: usize, indices: &[usize]) -> Result<Option<[Scalar; 2]>> {
        self.clone().select(axis, indices)?.min_max()
    }
}

impl MinMaxReduction for LoadedArray {
    fn min_max(&self) -> Result<Option<[Scalar; 2]>> {
        match self {
            LoadedArray::Eager(array) => array.min_max(),
            LoadedArray::Lazy(array) => array.min_max(),
        }
    }

    fn min_max_of_slices(&self, axis: usize, indices: &[usize]) -> Result<Option<[Scalar; 2]>> {
        match self {
            LoadedArray::Eager(array) => array.min_max_of_slices(axis, indices),
            LoadedArray::Lazy(array) => array.min_max_of_slices(axis, indices),
        }
    }
}
