//! Post-load normalization: logical recovery and display axis order

use crate::data_source::LoadedArray;
use crate::dtype::{DType, Scalar};
use crate::errors::Result;
use crate::reorder::reorder;
use crate::statistics::MinMaxReduction;
use tracing::debug;

/// Turn uint8 arrays whose maximum is exactly 1 back into booleans
///
/// MATLAB logicals come back from disk as uint8. Only eager arrays are checked;
/// lazy arrays would need a full scan and are returned unchanged.
///
/// # Errors
///
/// Never fails for eager arrays; kept fallible for symmetry with [`normalize`].
pub fn recover_bool(array: LoadedArray) -> Result<LoadedArray> {
    match array {
        LoadedArray::Eager(eager) if eager.dtype() == DType::UInt8 => {
            let is_logical = matches!(eager.min_max()?, Some([_, Scalar::UInt8(1)]));
            if is_logical {
                debug!(shape = ?eager.shape(), "recovered logical array");
                Ok(LoadedArray::Eager(eager.into_bool()))
            } else {
                Ok(LoadedArray::Eager(eager))
            }
        }
        other => Ok(other),
    }
}

/// Recover logical arrays, then move axes into display order
///
/// # Errors
///
/// Propagates reordering errors.
pub fn normalize(array: LoadedArray) -> Result<LoadedArray> {
    reorder(recover_bool(array)?)
}
