//! Axis reordering into display order
//!
//! Viewers expect the slice axis first. Classic files keep MATLAB's axis order,
//! so at most one axis has to move. HDF5 files store every axis reversed, so the
//! lazy path reverses the axes back before moving the slice axis to the front.

use crate::array::{move_axis_order, DynArray};
use crate::chunking::slice_axis;
use crate::data_source::LoadedArray;
use crate::errors::Result;
use crate::lazy::LazyArray;

/// Axis order for an eager (classic) array, `None` if it is already in display order
///
/// Only arrays with more than two axes whose third axis is strictly longer than
/// both the first and the second are changed: the third axis moves to the front.
#[must_use]
pub fn eager_order(shape: &[usize]) -> Option<Vec<usize>> {
    if shape.len() > 2 && shape[2] > shape[0] && shape[2] > shape[1] {
        move_axis_order(shape.len(), 2, 0).ok()
    } else {
        None
    }
}

/// Axis order for a lazy (HDF5) array, `None` if no change is needed
///
/// Two axes are swapped. With more axes, the reversed order is taken and the
/// longest axis within it moves to the front.
#[must_use]
pub fn lazy_order(shape: &[usize]) -> Option<Vec<usize>> {
    let n = shape.len();
    if n < 2 {
        return None;
    }
    let reversed: Vec<usize> = (0..n).rev().collect();
    if n == 2 {
        return Some(reversed);
    }
    let reversed_shape: Vec<usize> = reversed.iter().map(|&axis| shape[axis]).collect();
    let slice = slice_axis(&reversed_shape)?;
    let mut order = reversed;
    let axis = order.remove(slice);
    order.insert(0, axis);
    Some(order)
}

/// Move the slice axis of an eager array to the front
///
/// # Errors
///
/// Propagates permutation errors, which cannot occur for orders built here.
pub fn reorder_eager(array: DynArray) -> Result<DynArray> {
    match eager_order(array.shape()) {
        Some(order) => array.permuted_axes(&order),
        None => Ok(array),
    }
}

/// Undo HDF5 axis reversal on a lazy array and put the slice axis first
///
/// Only the view changes; no data is read.
///
/// # Errors
///
/// Propagates permutation errors, which cannot occur for orders built here.
pub fn reorder_lazy(array: LazyArray) -> Result<LazyArray> {
    match lazy_order(&array.shape()) {
        Some(order) => array.permuted_axes(&order),
        None => Ok(array),
    }
}

/// Reorder any loaded array according to its storage mode
///
/// # Errors
///
/// Propagates permutation errors.
pub fn reorder(array: LoadedArray) -> Result<LoadedArray> {
    Ok(match array {
        LoadedArray::Eager(array) => LoadedArray::Eager(reorder_eager(array)?),
        LoadedArray::Lazy(array) => LoadedArray::Lazy(reorder_lazy(array)?),
    })
}
