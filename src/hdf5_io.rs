//! HDF5 (v7.3) MAT-file access
//!
//! MATLAB v7.3 files are HDF5 files with a 512-byte user block. Each variable is
//! a top-level dataset; structs are groups and cell contents live in the `#refs#`
//! group. Datasets are opened as [`LazyArray`]s over an [`Hdf5Source`], so only
//! the regions a caller forces are read from disk.

use crate::array::DynArray;
use crate::chunking::{auto_chunks, plan_with_floor, DEFAULT_AUTO_CHUNK_BYTES, DEFAULT_SLICE_CHUNK};
use crate::data_source::{LoadedArray, LoadedVariables, SkippedVariable, VariableCatalog, VariableDescriptor};
use crate::dtype::DType;
use crate::errors::{MatImagesError, Result};
use crate::lazy::{region_info, ChunkSource, LazyArray};
use hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use hdf5::{Dataset, File};
use ndarray::IxDyn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Top-level names MATLAB uses for its own bookkeeping
pub const RESERVED_NAMES: [&str; 2] = ["#refs#", "#subsystem#"];

/// Map an HDF5 type onto a loadable element type
///
/// References, strings, compounds (complex data) and anything else that is not a
/// plain number return `None`.
#[must_use]
pub fn classify(descriptor: &TypeDescriptor) -> Option<DType> {
    match descriptor {
        TypeDescriptor::Boolean => Some(DType::Bool),
        TypeDescriptor::Unsigned(size) => Some(match size {
            IntSize::U1 => DType::UInt8,
            IntSize::U2 => DType::UInt16,
            IntSize::U4 => DType::UInt32,
            IntSize::U8 => DType::UInt64,
        }),
        TypeDescriptor::Integer(size) => Some(match size {
            IntSize::U1 => DType::Int8,
            IntSize::U2 => DType::Int16,
            IntSize::U4 => DType::Int32,
            IntSize::U8 => DType::Int64,
        }),
        TypeDescriptor::Float(FloatSize::U4) => Some(DType::Float32),
        TypeDescriptor::Float(FloatSize::U8) => Some(DType::Float64),
        _ => None,
    }
}

fn dataset_dtype(dataset: &Dataset) -> Result<Option<DType>> {
    let descriptor = dataset.dtype()?.to_descriptor()?;
    Ok(classify(&descriptor))
}

/// Strip the leading `/` from an absolute dataset path
fn short_name(path: &str) -> &str {
    path.trim_start_matches('/')
}

// =============================================================================
// Hdf5Source
// =============================================================================

/// [`ChunkSource`] reading hyperslabs from one dataset
#[derive(Debug)]
pub struct Hdf5Source {
    dataset: Dataset,
    dtype: DType,
    shape: Vec<usize>,
}

impl Hdf5Source {
    /// Wrap a numeric dataset
    ///
    /// # Errors
    ///
    /// Returns a `DTypeMismatch` if the dataset does not hold plain numbers.
    pub fn new(dataset: Dataset) -> Result<Self> {
        let dtype = dataset_dtype(&dataset)?.ok_or_else(|| MatImagesError::DTypeMismatch {
            expected: "numeric dataset".to_string(),
            found: dataset.name(),
        })?;
        let shape = dataset.shape();
        Ok(Self {
            dataset,
            dtype,
            shape,
        })
    }
}

impl ChunkSource for Hdf5Source {
    fn dtype(&self) -> DType {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn native_chunks(&self) -> Option<Vec<usize>> {
        self.dataset.chunk()
    }

    fn read_region(&self, start: &[usize], count: &[usize]) -> Result<DynArray> {
        let region = region_info(start, count)?;
        crate::with_dtype!(self.dtype, T => {
            let data = self.dataset.read_slice::<T, _, IxDyn>(region)?;
            Ok(DynArray::new(data))
        })
    }
}

// =============================================================================
// Hdf5Reader
// =============================================================================

/// Reader for v7.3 MAT-files
#[derive(Debug)]
pub struct Hdf5Reader {
    path: PathBuf,
    file: File,
    slice_floor: usize,
    auto_chunk_bytes: usize,
}

impl Hdf5Reader {
    /// Open an HDF5 file for reading
    ///
    /// # Errors
    ///
    /// Returns an `IoError` for a missing file and an `Hdf5Error` if the HDF5
    /// library cannot open it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // Report missing files as I/O errors rather than opaque HDF5 errors
        std::fs::metadata(&path)?;
        let file = File::open(&path)?;
        debug!(path = %path.display(), "opened HDF5 MAT-file");
        Ok(Self {
            path,
            file,
            slice_floor: DEFAULT_SLICE_CHUNK,
            auto_chunk_bytes: DEFAULT_AUTO_CHUNK_BYTES,
        })
    }

    /// Chunk length used in place of one-slice chunks on the slice axis
    #[must_use]
    pub fn with_slice_floor(mut self, floor: usize) -> Self {
        self.slice_floor = floor.max(1);
        self
    }

    /// Byte budget for chunking contiguous datasets
    #[must_use]
    pub fn with_auto_chunk_bytes(mut self, bytes: usize) -> Self {
        self.auto_chunk_bytes = bytes.max(1);
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn user_datasets(&self) -> Result<Vec<Dataset>> {
        Ok(self
            .file
            .datasets()?
            .into_iter()
            .filter(|ds| !RESERVED_NAMES.contains(&short_name(&ds.name())))
            .collect())
    }

    fn open_lazy(&self, dataset: Dataset) -> Result<LazyArray> {
        let source = Hdf5Source::new(dataset)?;
        let chunks = match source.native_chunks() {
            Some(native) => plan_with_floor(&source.shape, &native, self.slice_floor),
            None => auto_chunks(&source.shape, source.dtype.item_size(), self.auto_chunk_bytes),
        };
        debug!(
            var = %short_name(&source.dataset.name()),
            shape = ?source.shape,
            native = ?source.native_chunks(),
            planned = ?chunks,
            "planned chunks"
        );
        LazyArray::new(Arc::new(source), chunks)
    }
}

impl VariableCatalog for Hdf5Reader {
    fn variables(&self) -> Result<Vec<VariableDescriptor>> {
        Ok(self
            .user_datasets()?
            .iter()
            .map(|ds| {
                let name = short_name(&ds.name()).to_string();
                let dtype = dataset_dtype(ds).unwrap_or_else(|e| {
                    // Listed as non-numeric; `load` reports it as skipped
                    warn!(var = %name, error = %e, "cannot query dataset type");
                    None
                });
                VariableDescriptor {
                    name,
                    shape: ds.shape(),
                    dtype,
                }
            })
            .collect())
    }

    fn load(&self, names: &[String]) -> Result<LoadedVariables> {
        let mut loaded = LoadedVariables::default();
        for dataset in self.user_datasets()? {
            let name = short_name(&dataset.name()).to_string();
            if !names.contains(&name) {
                continue;
            }
            match dataset_dtype(&dataset) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(var = %name, "discarding dataset that is not a numeric array");
                    continue;
                }
                Err(e) => {
                    warn!(var = %name, error = %e, "skipping variable");
                    loaded.skipped.push(SkippedVariable {
                        name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            }
            match self.open_lazy(dataset) {
                Ok(array) => loaded.arrays.push((name, LoadedArray::Lazy(array.squeeze()))),
                Err(e) => {
                    warn!(var = %name, error = %e, "skipping variable");
                    loaded.skipped.push(SkippedVariable {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(loaded)
    }
}
