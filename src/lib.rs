//! mat_images: image variables from MATLAB .mat files
//!
//! A Rust library that finds the variables of a MATLAB container that look like
//! images, loads them (eagerly for classic Level 5 files, lazily for v7.3 HDF5
//! files), puts their axes in display order and estimates contrast limits from a
//! bounded random sample.
//!
//! ## Key Features
//!
//! - **Both MAT formats**: Level 5 (including zlib-compressed variables) and v7.3
//!   HDF5, told apart by content
//! - **Header-first loading**: variables are filtered by shape before any payload is read
//! - **Lazy arrays**: HDF5 datasets are read chunk by chunk at explicit forcing points
//! - **Sampled contrast limits**: bounded, injectable-randomness min/max estimates,
//!   per channel for 4D stacks
//! - **Parallel Processing**: min/max folds over eager buffers use Rayon
//!
//! ## Module Organization
//!
//! - [`container`]: format detection and the two-variant container
//! - [`classic_io`] / [`hdf5_io`]: the Level 5 decoder and the HDF5 reader
//! - [`lazy`]: chunk-backed arrays and the [`ChunkSource`](lazy::ChunkSource) trait
//! - [`chunking`], [`predicate`], [`reorder`], [`normalize`]: pipeline stages
//! - [`statistics`]: min/max reductions and contrast estimation
//! - [`reader`]: the read pipeline producing [`DisplayRecord`](reader::DisplayRecord)s
//! - [`metadata`]: printable catalogs and record summaries
//! - [`parallel`]: Parallel processing configuration
//! - [`errors`]: Centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mat_images::prelude::*;
//!
//! let records = mat_images::read_paths(&["volume.mat"])?;
//! for record in records.unwrap_or_default() {
//!     let (array, meta) = record.into_layer_data();
//!     println!("{} {:?} {:?}", meta.name, array.shape(), meta.contrast_limits);
//! }
//! # Ok::<(), MatImagesError>(())
//! ```

// Core modules
pub mod array;
pub mod chunking;
pub mod classic_io;
pub mod config;
pub mod container;
pub mod data_source;
pub mod dtype;
pub mod errors;
pub mod hdf5_io;
pub mod lazy;
pub mod metadata;
pub mod normalize;
pub mod parallel;
pub mod predicate;
pub mod reader;
pub mod reorder;
pub mod statistics;

// Direct re-exports for the public API
pub use array::DynArray;
pub use config::ReaderConfig;
pub use container::{detect_format, load_image_variables, Container, ContainerFormat};
pub use data_source::*;
pub use dtype::{DType, Element, Scalar, ValueKind};
pub use errors::*;
pub use lazy::{ChunkSource, LazyArray, MemorySource};
pub use parallel::*;
pub use predicate::{is_image, is_image_with};
pub use reader::{get_reader, read_paths, DisplayRecord, LayerMetadata, MatImageReader};
pub use statistics::ContrastLimits;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::array::DynArray;
    pub use crate::config::ReaderConfig;
    pub use crate::container::{Container, ContainerFormat};
    pub use crate::data_source::{LoadedArray, VariableCatalog, VariableDescriptor};
    pub use crate::dtype::{DType, Scalar};
    pub use crate::errors::{MatImagesError, Result};
    pub use crate::lazy::LazyArray;
    pub use crate::parallel::ParallelConfig;
    pub use crate::reader::{DisplayRecord, MatImageReader};
    pub use crate::statistics::{ContrastLimits, MinMaxReduction};
}
