//! Data source abstraction shared by the classic and HDF5 readers
//!
//! Reading a MAT-file is a two-phase protocol: a [`VariableCatalog`] first lists
//! [`VariableDescriptor`]s from headers alone, then loads a chosen subset into
//! [`LoadedArray`]s. Classic files load eagerly; HDF5 files load lazily.

use crate::array::DynArray;
use crate::dtype::{DType, ValueKind};
use crate::errors::Result;
use crate::lazy::LazyArray;

/// Name, shape and element type of a stored variable, read without its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub name: String,
    /// Shape in the container's own axis order
    pub shape: Vec<usize>,
    /// `None` for cells, structs, strings, sparse and complex data
    pub dtype: Option<DType>,
}

impl VariableDescriptor {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.dtype.map_or(ValueKind::OtherNonArray, DType::kind)
    }
}

/// A variable that was selected for loading but could not be turned into an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedVariable {
    pub name: String,
    pub reason: String,
}

/// Outcome of loading a set of variables from one container
#[derive(Debug, Clone, Default)]
pub struct LoadedVariables {
    /// Loaded arrays in container order
    pub arrays: Vec<(String, LoadedArray)>,
    /// Variables that failed to load; the rest of the container is unaffected
    pub skipped: Vec<SkippedVariable>,
}

impl LoadedVariables {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

/// Header-first access to the variables of a container
pub trait VariableCatalog {
    /// List every variable without reading array payloads
    ///
    /// # Errors
    ///
    /// Returns an error if the container structure cannot be read.
    fn variables(&self) -> Result<Vec<VariableDescriptor>>;

    /// Load the named variables
    ///
    /// Values that turn out not to be numeric arrays are dropped. Variables that
    /// fail to decode are reported in [`LoadedVariables::skipped`].
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that affect the whole container.
    fn load(&self, names: &[String]) -> Result<LoadedVariables>;
}

/// An array produced by a catalog, either in memory or backed by chunked storage
#[derive(Debug, Clone)]
pub enum LoadedArray {
    Eager(DynArray),
    Lazy(LazyArray),
}

impl LoadedArray {
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        matches!(self, LoadedArray::Lazy(_))
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            LoadedArray::Eager(array) => array.dtype(),
            LoadedArray::Lazy(array) => array.dtype(),
        }
    }

    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        match self {
            LoadedArray::Eager(array) => array.shape().to_vec(),
            LoadedArray::Lazy(array) => array.shape(),
        }
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        match self {
            LoadedArray::Eager(array) => array.ndim(),
            LoadedArray::Lazy(array) => array.ndim(),
        }
    }

    /// Remove every axis of length 1
    #[must_use]
    pub fn squeeze(self) -> Self {
        match self {
            LoadedArray::Eager(array) => LoadedArray::Eager(array.squeeze()),
            LoadedArray::Lazy(array) => LoadedArray::Lazy(array.squeeze()),
        }
    }

    /// Reorder axes so that output axis `i` is input axis `order[i]`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if `order` is not a permutation of the axes.
    pub fn permuted_axes(self, order: &[usize]) -> Result<Self> {
        Ok(match self {
            LoadedArray::Eager(array) => LoadedArray::Eager(array.permuted_axes(order)?),
            LoadedArray::Lazy(array) => LoadedArray::Lazy(array.permuted_axes(order)?),
        })
    }

    /// Keep only `indices` along `axis`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the axis or any index is out of bounds.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Result<Self> {
        Ok(match self {
            LoadedArray::Eager(array) => LoadedArray::Eager(array.select(axis, indices)?),
            LoadedArray::Lazy(array) => LoadedArray::Lazy(array.clone().select(axis, indices)?),
        })
    }

    /// Drop `axis` by fixing it at `index`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the axis or index is out of bounds.
    pub fn index_axis(&self, axis: usize, index: usize) -> Result<Self> {
        Ok(match self {
            LoadedArray::Eager(array) => LoadedArray::Eager(array.index_axis(axis, index)?),
            LoadedArray::Lazy(array) => LoadedArray::Lazy(array.clone().index_axis(axis, index)?),
        })
    }

    /// Read scattered elements into a 1-D array. Forcing point for lazy arrays.
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` for out-of-bounds points and propagates read failures.
    pub fn gather(&self, points: &[Vec<usize>]) -> Result<DynArray> {
        match self {
            LoadedArray::Eager(array) => array.gather(points),
            LoadedArray::Lazy(array) => array.gather(points),
        }
    }

    /// Materialize the array. Forcing point for lazy arrays.
    ///
    /// # Errors
    ///
    /// Propagates read failures from lazy storage.
    pub fn compute(&self) -> Result<DynArray> {
        match self {
            LoadedArray::Eager(array) => Ok(array.clone()),
            LoadedArray::Lazy(array) => array.compute(),
        }
    }

    /// Materialize the array, consuming the handle
    ///
    /// # Errors
    ///
    /// Propagates read failures from lazy storage.
    pub fn into_eager(self) -> Result<DynArray> {
        match self {
            LoadedArray::Eager(array) => Ok(array),
            LoadedArray::Lazy(array) => array.compute(),
        }
    }
}

impl From<DynArray> for LoadedArray {
    fn from(array: DynArray) -> Self {
        LoadedArray::Eager(array)
    }
}

impl From<LazyArray> for LoadedArray {
    fn from(array: LazyArray) -> Self {
        LoadedArray::Lazy(array)
    }
}
