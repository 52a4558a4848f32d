//! Eagerly materialized arrays of any supported element type
//!
//! [`DynArray`] is the contiguous, random-access buffer produced by the classic
//! decoder and by forcing a lazy array. Shape manipulation (axis moves, squeeze,
//! selection) is type-independent and dispatched over the variants here.

use crate::dtype::{DType, Element};
use crate::errors::{MatImagesError, Result};
use ndarray::{ArrayD, Axis, IxDyn};

/// A materialized n-dimensional array of one of the supported element types
#[derive(Debug, Clone, PartialEq)]
pub enum DynArray {
    Bool(ArrayD<bool>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

/// Evaluate `$body` with `$a` bound to the inner array, whatever its type
macro_rules! dispatch {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            DynArray::Bool($a) => $body,
            DynArray::UInt8($a) => $body,
            DynArray::UInt16($a) => $body,
            DynArray::UInt32($a) => $body,
            DynArray::UInt64($a) => $body,
            DynArray::Int8($a) => $body,
            DynArray::Int16($a) => $body,
            DynArray::Int32($a) => $body,
            DynArray::Int64($a) => $body,
            DynArray::Float32($a) => $body,
            DynArray::Float64($a) => $body,
        }
    };
}

/// Like `dispatch!`, but rewraps the resulting array in the same variant
macro_rules! map_same {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            DynArray::Bool($a) => DynArray::Bool($body),
            DynArray::UInt8($a) => DynArray::UInt8($body),
            DynArray::UInt16($a) => DynArray::UInt16($body),
            DynArray::UInt32($a) => DynArray::UInt32($body),
            DynArray::UInt64($a) => DynArray::UInt64($body),
            DynArray::Int8($a) => DynArray::Int8($body),
            DynArray::Int16($a) => DynArray::Int16($body),
            DynArray::Int32($a) => DynArray::Int32($body),
            DynArray::Int64($a) => DynArray::Int64($body),
            DynArray::Float32($a) => DynArray::Float32($body),
            DynArray::Float64($a) => DynArray::Float64($body),
        }
    };
}

pub(crate) use dispatch;

impl DynArray {
    /// Wrap a typed array
    pub fn new<T: Element>(array: ArrayD<T>) -> Self {
        T::wrap(array)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            DynArray::Bool(_) => DType::Bool,
            DynArray::UInt8(_) => DType::UInt8,
            DynArray::UInt16(_) => DType::UInt16,
            DynArray::UInt32(_) => DType::UInt32,
            DynArray::UInt64(_) => DType::UInt64,
            DynArray::Int8(_) => DType::Int8,
            DynArray::Int16(_) => DType::Int16,
            DynArray::Int32(_) => DType::Int32,
            DynArray::Int64(_) => DType::Int64,
            DynArray::Float32(_) => DType::Float32,
            DynArray::Float64(_) => DType::Float64,
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        dispatch!(self, a => a.ndim())
    }

    /// Total number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extract the typed buffer, failing if the element type differs
    ///
    /// # Errors
    ///
    /// Returns `DTypeMismatch` if `T` is not the stored element type.
    pub fn into_typed<T: Element>(self) -> Result<ArrayD<T>> {
        T::unwrap(self).map_err(|other| MatImagesError::DTypeMismatch {
            expected: T::DTYPE.to_string(),
            found: other.dtype().to_string(),
        })
    }

    /// Reorder axes so that output axis `i` is input axis `order[i]`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if `order` is not a permutation of the axes.
    pub fn permuted_axes(self, order: &[usize]) -> Result<Self> {
        check_permutation(order, self.ndim())?;
        Ok(map_same!(self, a => a.permuted_axes(IxDyn(order))))
    }

    /// Move axis `from` to position `to`, keeping the other axes in order
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if either axis is out of bounds.
    pub fn move_axis(self, from: usize, to: usize) -> Result<Self> {
        let order = move_axis_order(self.ndim(), from, to)?;
        self.permuted_axes(&order)
    }

    /// Remove every axis of length 1
    #[must_use]
    pub fn squeeze(self) -> Self {
        map_same!(self, a => {
            let mut a = a;
            for axis in (0..a.ndim()).rev() {
                if a.len_of(Axis(axis)) == 1 {
                    a = a.index_axis_move(Axis(axis), 0);
                }
            }
            a
        })
    }

    /// Keep only `indices` along `axis`, in the given order
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the axis or any index is out of bounds.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Result<Self> {
        check_axis(axis, self.ndim())?;
        let len = self.shape()[axis];
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(MatImagesError::shape(format!(
                "Index {bad} out of bounds for axis {axis} of length {len}"
            )));
        }
        Ok(map_same!(self, a => a.select(Axis(axis), indices)))
    }

    /// Drop `axis` by fixing it at `index`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the axis or index is out of bounds.
    pub fn index_axis(&self, axis: usize, index: usize) -> Result<Self> {
        check_axis(axis, self.ndim())?;
        if index >= self.shape()[axis] {
            return Err(MatImagesError::shape(format!(
                "Index {index} out of bounds for axis {axis} of length {}",
                self.shape()[axis]
            )));
        }
        Ok(map_same!(self, a => a.index_axis(Axis(axis), index).to_owned()))
    }

    /// Read the scattered elements at `points` into a one-dimensional array
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if a point has the wrong rank or lies outside the array.
    pub fn gather(&self, points: &[Vec<usize>]) -> Result<Self> {
        let ndim = self.ndim();
        if let Some(point) = points.iter().find(|p| p.len() != ndim) {
            return Err(MatImagesError::shape(format!(
                "Point {point:?} does not address a {ndim}-dimensional array"
            )));
        }
        Ok(map_same!(self, a => {
            let mut values = Vec::with_capacity(points.len());
            for point in points {
                let value = a.get(point.as_slice()).ok_or_else(|| {
                    MatImagesError::shape(format!(
                        "Point {:?} outside array of shape {:?}",
                        point,
                        a.shape()
                    ))
                })?;
                values.push(*value);
            }
            ArrayD::from_shape_vec(IxDyn(&[values.len()]), values)?
        }))
    }

    /// Reinterpret a uint8 array as boolean (nonzero is `true`)
    #[must_use]
    pub fn into_bool(self) -> Self {
        match self {
            DynArray::UInt8(a) => DynArray::Bool(a.mapv(|v| v != 0)),
            other => other,
        }
    }
}

impl<T: Element> From<ArrayD<T>> for DynArray {
    fn from(array: ArrayD<T>) -> Self {
        T::wrap(array)
    }
}

/// Number of elements in an array of `shape`, `None` if it overflows `usize`
///
/// Shapes read from files are untrusted, so they are never multiplied unchecked.
#[must_use]
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len))
}

pub(crate) fn check_axis(axis: usize, ndim: usize) -> Result<()> {
    if axis >= ndim {
        return Err(MatImagesError::shape(format!(
            "Axis {axis} is out of bounds for array with {ndim} dimensions"
        )));
    }
    Ok(())
}

pub(crate) fn check_permutation(order: &[usize], ndim: usize) -> Result<()> {
    let mut seen = vec![false; ndim];
    if order.len() != ndim {
        return Err(MatImagesError::shape(format!(
            "Axis order {order:?} does not match {ndim} dimensions"
        )));
    }
    for &axis in order {
        check_axis(axis, ndim)?;
        if std::mem::replace(&mut seen[axis], true) {
            return Err(MatImagesError::shape(format!(
                "Axis {axis} repeated in axis order {order:?}"
            )));
        }
    }
    Ok(())
}

/// Axis order that moves `from` to `to` and leaves the rest in place
///
/// # Errors
///
/// Returns a `ShapeError` if either axis is out of bounds.
pub fn move_axis_order(ndim: usize, from: usize, to: usize) -> Result<Vec<usize>> {
    check_axis(from, ndim)?;
    check_axis(to, ndim)?;
    let mut order: Vec<usize> = (0..ndim).filter(|&axis| axis != from).collect();
    order.insert(to, from);
    Ok(order)
}
