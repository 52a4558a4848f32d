//! Shape heuristic deciding which variables are images

/// Default threshold an axis must exceed to count as image-sized
pub const DEFAULT_MIN_SIZE: usize = 20;

/// Whether `shape` looks like an image, using [`DEFAULT_MIN_SIZE`]
///
/// True iff at least two axes are longer than 20, which rules out scalars,
/// vectors and small lookup tables.
#[must_use]
pub fn is_image(shape: &[usize]) -> bool {
    is_image_with(shape, DEFAULT_MIN_SIZE)
}

/// [`is_image`] with a custom threshold
#[must_use]
pub fn is_image_with(shape: &[usize], min_size: usize) -> bool {
    shape.iter().filter(|&&len| len > min_size).count() >= 2
}
