//! Chunk sizing for lazily loaded HDF5 datasets
//!
//! Chunk shapes are decided before a lazy handle is opened. Datasets written one
//! slice per chunk are pathologically slow to walk sequentially, so the slice
//! axis is widened; unchunked datasets get a chunk shape bounded by a byte budget.

/// Chunk length forced onto a slice axis that is natively chunked one slice at a time
pub const DEFAULT_SLICE_CHUNK: usize = 10;

/// Byte budget for automatically chunked (contiguous) datasets
pub const DEFAULT_AUTO_CHUNK_BYTES: usize = 128 * 1024 * 1024;

/// Index of the longest axis, the first one on ties
#[must_use]
pub fn slice_axis(shape: &[usize]) -> Option<usize> {
    shape
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (axis, &len)| match best {
            Some((_, best_len)) if best_len >= len => best,
            _ => Some((axis, len)),
        })
        .map(|(axis, _)| axis)
}

/// Plan the chunk shape used to read a dataset of `full_shape`
///
/// The axis with the largest extent is taken as the slice axis. If the native
/// chunking along it is exactly one, it is raised to [`DEFAULT_SLICE_CHUNK`];
/// every other axis keeps its native chunk length.
#[must_use]
pub fn plan(full_shape: &[usize], native_chunks: &[usize]) -> Vec<usize> {
    plan_with_floor(full_shape, native_chunks, DEFAULT_SLICE_CHUNK)
}

/// [`plan`] with a configurable replacement for one-slice chunks
#[must_use]
pub fn plan_with_floor(full_shape: &[usize], native_chunks: &[usize], floor: usize) -> Vec<usize> {
    let mut chunks = native_chunks.to_vec();
    if let Some(axis) = slice_axis(full_shape) {
        if chunks.get(axis) == Some(&1) {
            chunks[axis] = floor;
        }
    }
    chunks
}

/// Chunk shape for a dataset stored without chunking
///
/// Every axis but the slice axis is read whole; the slice axis is cut so one
/// chunk stays within `budget_bytes` (and holds at least one slice).
#[must_use]
pub fn auto_chunks(full_shape: &[usize], item_size: usize, budget_bytes: usize) -> Vec<usize> {
    let mut chunks = full_shape.to_vec();
    if let Some(axis) = slice_axis(full_shape) {
        let slice_bytes: usize = full_shape
            .iter()
            .enumerate()
            .filter(|&(other, _)| other != axis)
            .fold(item_size.max(1), |acc, (_, &len)| acc.saturating_mul(len.max(1)));
        let per_chunk = (budget_bytes / slice_bytes.max(1)).max(1);
        chunks[axis] = per_chunk.min(full_shape[axis].max(1));
    }
    chunks
}
