//! Lazy, chunk-backed arrays
//!
//! A [`LazyArray`] is a view over a [`ChunkSource`]: axis selections, squeezing
//! and axis permutations only rewrite the view and never touch storage. Data is
//! read at explicit forcing points:
//!
//! - [`LazyArray::compute`] materializes the whole view as a [`DynArray`]
//! - [`LazyArray::gather`] reads a set of scattered elements
//! - [`LazyArray::for_each_block`] streams the view block by block, for reductions
//!   that must not materialize the array
//!
//! Every forcing point may block on disk I/O and decompression. Reads are split
//! at planned chunk boundaries and issued in ascending index order when the
//! selection is sorted.

use crate::array::{check_axis, check_permutation, dispatch, DynArray};
use crate::dtype::{DType, Element};
use crate::errors::{MatImagesError, Result};
use ndarray::{ArrayD, Axis, IxDyn, SliceInfo, SliceInfoElem};
use std::fmt;
use std::sync::Arc;

/// Chunked storage that can serve rectangular regions on demand
pub trait ChunkSource: fmt::Debug {
    /// Element type of the stored data
    fn dtype(&self) -> DType;

    /// Full on-disk shape
    fn shape(&self) -> &[usize];

    /// Native chunk shape, `None` for contiguous storage
    fn native_chunks(&self) -> Option<Vec<usize>>;

    /// Read the hyperslab starting at `start` with `count` elements per axis
    ///
    /// # Errors
    ///
    /// Returns an error if the region is out of bounds or the backend read fails.
    fn read_region(&self, start: &[usize], count: &[usize]) -> Result<DynArray>;
}

/// Build an ndarray slice selecting `count` elements from `start` on every axis
pub(crate) fn region_info(
    start: &[usize],
    count: &[usize],
) -> Result<SliceInfo<Vec<SliceInfoElem>, IxDyn, IxDyn>> {
    let elems: Vec<SliceInfoElem> = start
        .iter()
        .zip(count)
        .map(|(&s, &c)| SliceInfoElem::Slice {
            start: to_isize(s),
            end: Some(to_isize(s + c)),
            step: 1,
        })
        .collect();
    Ok(SliceInfo::try_from(elems)?)
}

#[allow(clippy::cast_possible_wrap)]
fn to_isize(value: usize) -> isize {
    value as isize
}

/// Selection applied to one source axis
#[derive(Debug, Clone, PartialEq, Eq)]
enum AxisSelection {
    All,
    Indices(Vec<usize>),
    /// Axis dropped from the view, pinned at this source index
    Fixed(usize),
}

impl AxisSelection {
    fn len(&self, source_len: usize) -> usize {
        match self {
            AxisSelection::All => source_len,
            AxisSelection::Indices(indices) => indices.len(),
            AxisSelection::Fixed(_) => 1,
        }
    }

    fn source_index(&self, i: usize) -> usize {
        match self {
            AxisSelection::All => i,
            AxisSelection::Indices(indices) => indices[i],
            AxisSelection::Fixed(index) => *index,
        }
    }

    fn source_indices(&self, source_len: usize) -> Vec<usize> {
        match self {
            AxisSelection::All => (0..source_len).collect(),
            AxisSelection::Indices(indices) => indices.clone(),
            AxisSelection::Fixed(index) => vec![*index],
        }
    }
}

/// A contiguous stretch of source indices that lies within one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    source_start: usize,
    count: usize,
    out_offset: usize,
}

fn axis_runs(indices: &[usize], chunk: usize) -> Vec<Run> {
    let chunk = chunk.max(1);
    let mut runs: Vec<Run> = Vec::new();
    for (out_offset, &index) in indices.iter().enumerate() {
        match runs.last_mut() {
            Some(run)
                if run.source_start + run.count == index
                    && run.source_start / chunk == index / chunk =>
            {
                run.count += 1;
            }
            _ => runs.push(Run {
                source_start: index,
                count: 1,
                out_offset,
            }),
        }
    }
    runs
}

/// Visit the cartesian product of per-axis runs, last axis fastest
fn for_each_block_of<F>(runs: &[Vec<Run>], mut visit: F) -> Result<()>
where
    F: FnMut(&[Run]) -> Result<()>,
{
    if runs.iter().any(Vec::is_empty) {
        return Ok(());
    }
    let mut cursor = vec![0usize; runs.len()];
    loop {
        let block: Vec<Run> = cursor
            .iter()
            .zip(runs)
            .map(|(&i, axis_runs)| axis_runs[i])
            .collect();
        visit(&block)?;

        let mut axis = runs.len();
        loop {
            if axis == 0 {
                return Ok(());
            }
            axis -= 1;
            cursor[axis] += 1;
            if cursor[axis] < runs[axis].len() {
                break;
            }
            cursor[axis] = 0;
        }
    }
}

/// Deferred view over chunked storage
#[derive(Debug, Clone)]
pub struct LazyArray {
    source: Arc<dyn ChunkSource>,
    chunks: Vec<usize>,
    selection: Vec<AxisSelection>,
    /// Source axis behind each view axis
    axes: Vec<usize>,
}

impl LazyArray {
    /// Wrap a source, reading it in blocks of `chunks` (source axis order)
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if `chunks` does not match the source rank.
    pub fn new(source: Arc<dyn ChunkSource>, chunks: Vec<usize>) -> Result<Self> {
        let ndim = source.shape().len();
        if chunks.len() != ndim {
            return Err(MatImagesError::shape(format!(
                "Chunk shape {:?} does not match {}-dimensional source",
                chunks, ndim
            )));
        }
        Ok(Self {
            source,
            chunks,
            selection: vec![AxisSelection::All; ndim],
            axes: (0..ndim).collect(),
        })
    }

    /// Wrap a source using its native chunking (whole array if contiguous)
    pub fn from_source(source: Arc<dyn ChunkSource>) -> Self {
        let chunks = source
            .native_chunks()
            .unwrap_or_else(|| source.shape().to_vec());
        let ndim = chunks.len();
        Self {
            source,
            chunks,
            selection: vec![AxisSelection::All; ndim],
            axes: (0..ndim).collect(),
        }
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.source.dtype()
    }

    /// Shape of the view
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        let source_shape = self.source.shape();
        self.axes
            .iter()
            .map(|&s| self.selection[s].len(source_shape[s]))
            .collect()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shape().iter().fold(1, |acc, &len| acc.saturating_mul(len))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Planned chunk length behind each view axis
    #[must_use]
    pub fn chunks(&self) -> Vec<usize> {
        self.axes.iter().map(|&s| self.chunks[s]).collect()
    }

    /// Remove every view axis of length 1
    #[must_use]
    pub fn squeeze(mut self) -> Self {
        for axis in (0..self.ndim()).rev() {
            if self.shape()[axis] == 1 {
                let source_axis = self.axes.remove(axis);
                let pinned = self.selection[source_axis].source_index(0);
                self.selection[source_axis] = AxisSelection::Fixed(pinned);
            }
        }
        self
    }

    /// Reorder view axes so that output axis `i` is view axis `order[i]`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if `order` is not a permutation of the view axes.
    pub fn permuted_axes(mut self, order: &[usize]) -> Result<Self> {
        check_permutation(order, self.ndim())?;
        self.axes = order.iter().map(|&axis| self.axes[axis]).collect();
        Ok(self)
    }

    /// Keep only `indices` along view axis `axis`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the axis or any index is out of bounds.
    pub fn select(mut self, axis: usize, indices: &[usize]) -> Result<Self> {
        check_axis(axis, self.ndim())?;
        let len = self.shape()[axis];
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(MatImagesError::shape(format!(
                "Index {bad} out of bounds for axis {axis} of length {len}"
            )));
        }
        let source_axis = self.axes[axis];
        let current = &self.selection[source_axis];
        let mapped = indices.iter().map(|&i| current.source_index(i)).collect();
        self.selection[source_axis] = AxisSelection::Indices(mapped);
        Ok(self)
    }

    /// Drop view axis `axis` by fixing it at `index`
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the axis or index is out of bounds.
    pub fn index_axis(mut self, axis: usize, index: usize) -> Result<Self> {
        check_axis(axis, self.ndim())?;
        let len = self.shape()[axis];
        if index >= len {
            return Err(MatImagesError::shape(format!(
                "Index {index} out of bounds for axis {axis} of length {len}"
            )));
        }
        let source_axis = self.axes.remove(axis);
        let pinned = self.selection[source_axis].source_index(index);
        self.selection[source_axis] = AxisSelection::Fixed(pinned);
        Ok(self)
    }

    fn plan_runs(&self) -> Vec<Vec<Run>> {
        let source_shape = self.source.shape();
        self.selection
            .iter()
            .enumerate()
            .map(|(s, sel)| axis_runs(&sel.source_indices(source_shape[s]), self.chunks[s]))
            .collect()
    }

    /// Stream the view as source-ordered blocks, each within one planned chunk
    ///
    /// Blocks keep the source axis order and carry length-1 axes for dropped
    /// axes, so they suit order-independent reductions. Forcing point.
    ///
    /// # Errors
    ///
    /// Propagates read failures and errors returned by `visit`.
    pub fn for_each_block<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(DynArray) -> Result<()>,
    {
        let runs = self.plan_runs();
        for_each_block_of(&runs, |block| {
            let start: Vec<usize> = block.iter().map(|r| r.source_start).collect();
            let count: Vec<usize> = block.iter().map(|r| r.count).collect();
            visit(self.source.read_region(&start, &count)?)
        })
    }

    /// Materialize the whole view. Forcing point.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the source.
    pub fn compute(&self) -> Result<DynArray> {
        crate::with_dtype!(self.dtype(), T => Ok(DynArray::new(self.compute_typed::<T>()?)))
    }

    fn compute_typed<T: Element>(&self) -> Result<ArrayD<T>> {
        let runs = self.plan_runs();
        let out_shape: Vec<usize> = runs
            .iter()
            .map(|axis_runs| axis_runs.iter().map(|r| r.count).sum())
            .collect();
        let mut out = ArrayD::<T>::default(IxDyn(&out_shape));

        for_each_block_of(&runs, |block| {
            let start: Vec<usize> = block.iter().map(|r| r.source_start).collect();
            let count: Vec<usize> = block.iter().map(|r| r.count).collect();
            let offset: Vec<usize> = block.iter().map(|r| r.out_offset).collect();
            let data = self.source.read_region(&start, &count)?.into_typed::<T>()?;
            let region = region_info(&offset, &count)?;
            out.slice_mut(&region).assign(&data);
            Ok(())
        })?;

        // Dropped axes are length 1 in `out`; remove them, then apply the view order
        let mut compact = Vec::with_capacity(self.selection.len());
        let mut kept = 0;
        for (s, sel) in self.selection.iter().enumerate().rev() {
            if matches!(sel, AxisSelection::Fixed(_)) {
                out = out.index_axis_move(Axis(s), 0);
            }
        }
        for sel in &self.selection {
            compact.push(kept);
            if !matches!(sel, AxisSelection::Fixed(_)) {
                kept += 1;
            }
        }
        let order: Vec<usize> = self.axes.iter().map(|&s| compact[s]).collect();
        Ok(out.permuted_axes(IxDyn(&order)))
    }

    /// Read the elements at view coordinates `points` into a 1-D array. Forcing point.
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` for out-of-bounds points and propagates read failures.
    pub fn gather(&self, points: &[Vec<usize>]) -> Result<DynArray> {
        crate::with_dtype!(self.dtype(), T => Ok(DynArray::new(self.gather_typed::<T>(points)?)))
    }

    fn gather_typed<T: Element>(&self, points: &[Vec<usize>]) -> Result<ArrayD<T>> {
        let shape = self.shape();
        let ones = vec![1usize; self.selection.len()];
        let mut values = Vec::with_capacity(points.len());
        for point in points {
            if point.len() != shape.len() || point.iter().zip(&shape).any(|(&i, &n)| i >= n) {
                return Err(MatImagesError::shape(format!(
                    "Point {:?} outside array of shape {:?}",
                    point, shape
                )));
            }
            let start = self.source_point(point);
            let data = self.source.read_region(&start, &ones)?.into_typed::<T>()?;
            let value = data.iter().next().copied().ok_or_else(|| {
                MatImagesError::Generic(format!("Empty read at source index {:?}", start))
            })?;
            values.push(value);
        }
        Ok(ArrayD::from_shape_vec(IxDyn(&[values.len()]), values)?)
    }

    fn source_point(&self, point: &[usize]) -> Vec<usize> {
        let mut source: Vec<usize> = self
            .selection
            .iter()
            .map(|sel| match sel {
                AxisSelection::Fixed(index) => *index,
                _ => 0,
            })
            .collect();
        for (&s, &i) in self.axes.iter().zip(point) {
            source[s] = self.selection[s].source_index(i);
        }
        source
    }
}

/// In-memory [`ChunkSource`], handy for tests and for re-chunking eager data
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: DynArray,
    chunks: Option<Vec<usize>>,
}

impl MemorySource {
    pub fn new(data: impl Into<DynArray>, chunks: Option<Vec<usize>>) -> Self {
        Self {
            data: data.into(),
            chunks,
        }
    }

    /// Convenience for building a lazy array straight from memory
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the chunk shape does not match the data.
    pub fn into_lazy(self) -> Result<LazyArray> {
        match self.chunks.clone() {
            Some(chunks) => LazyArray::new(Arc::new(self), chunks),
            None => Ok(LazyArray::from_source(Arc::new(self))),
        }
    }
}

impl ChunkSource for MemorySource {
    fn dtype(&self) -> DType {
        self.data.dtype()
    }

    fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn native_chunks(&self) -> Option<Vec<usize>> {
        self.chunks.clone()
    }

    fn read_region(&self, start: &[usize], count: &[usize]) -> Result<DynArray> {
        let shape = self.data.shape();
        let in_bounds = start.len() == shape.len()
            && count.len() == shape.len()
            && start
                .iter()
                .zip(count)
                .zip(shape)
                .all(|((&s, &c), &n)| s + c <= n);
        if !in_bounds {
            return Err(MatImagesError::shape(format!(
                "Region start {:?} count {:?} outside array of shape {:?}",
                start, count, shape
            )));
        }
        let region = region_info(start, count)?;
        Ok(dispatch!(&self.data, a => DynArray::from(a.slice(&region).to_owned())))
    }
}
