//! Read pipeline producing display records
//!
//! For every input file: detect the container, keep image-shaped variables, load
//! them, normalize dtype and axis order, then estimate contrast limits. Each
//! surviving variable becomes one [`DisplayRecord`].
//!
//! ```rust,no_run
//! use mat_images::reader::{get_reader, MatImageReader};
//! use mat_images::ReaderConfig;
//!
//! let paths = vec!["stack.mat"];
//! if get_reader(&paths).is_some() {
//!     let mut reader = MatImageReader::new(ReaderConfig::default().with_seed(7));
//!     if let Some(records) = reader.read_paths(&paths)? {
//!         for record in &records {
//!             println!("{} {:?}", record.name, record.array.shape());
//!         }
//!     }
//! }
//! # Ok::<(), mat_images::MatImagesError>(())
//! ```

use crate::config::ReaderConfig;
use crate::container::load_image_variables;
use crate::data_source::{LoadedArray, SkippedVariable};
use crate::errors::Result;
use crate::normalize::normalize;
use crate::statistics::contrast::{estimate, estimate_channels, ContrastLimits};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File suffix accepted by [`get_reader`]
pub const MAT_EXTENSION: &str = ".mat";

/// Position of the channel axis in normalized 4D arrays
pub const CHANNEL_AXIS: usize = 3;

/// Display hints attached to each record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerMetadata {
    pub name: String,
    pub contrast_limits: ContrastLimits,
    /// Present only for 4D arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_axis: Option<usize>,
    /// `Some(false)` for lazily loaded arrays, absent for eager ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pyramid: Option<bool>,
}

/// One normalized image variable ready for display
#[derive(Debug, Clone)]
pub struct DisplayRecord {
    pub name: String,
    pub array: LoadedArray,
    pub contrast_limits: ContrastLimits,
    pub channel_axis: Option<usize>,
}

impl DisplayRecord {
    #[must_use]
    pub fn is_pyramid(&self) -> Option<bool> {
        self.array.is_lazy().then_some(false)
    }

    #[must_use]
    pub fn metadata(&self) -> LayerMetadata {
        LayerMetadata {
            name: self.name.clone(),
            contrast_limits: self.contrast_limits.clone(),
            channel_axis: self.channel_axis,
            is_pyramid: self.is_pyramid(),
        }
    }

    /// Split into the `(array, metadata)` pair handed to a viewer
    #[must_use]
    pub fn into_layer_data(self) -> (LoadedArray, LayerMetadata) {
        let metadata = self.metadata();
        (self.array, metadata)
    }
}

/// Records read from one file, plus the variables that were skipped
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub records: Vec<DisplayRecord>,
    pub skipped: Vec<SkippedVariable>,
}

/// Reads MAT-files into [`DisplayRecord`]s
///
/// The random source used for contrast sampling is owned by the reader. Use a
/// seeded config (or [`MatImageReader::with_rng`]) for reproducible limits.
#[derive(Debug)]
pub struct MatImageReader<R = StdRng> {
    config: ReaderConfig,
    rng: R,
}

impl MatImageReader<StdRng> {
    /// Reader seeded from `config.seed`, or from system entropy when unset
    pub fn new(config: ReaderConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }
}

impl Default for MatImageReader<StdRng> {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

impl<R: Rng> MatImageReader<R> {
    /// Reader drawing samples from a caller-supplied random source
    pub fn with_rng(config: ReaderConfig, rng: R) -> Self {
        Self { config, rng }
    }

    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    fn contrast_limits(&mut self, array: &LoadedArray) -> Result<ContrastLimits> {
        let samples = self.config.contrast_samples;
        if array.ndim() == 4 {
            Ok(ContrastLimits::PerChannel(estimate_channels(
                array,
                CHANNEL_AXIS,
                samples,
                &mut self.rng,
            )?))
        } else {
            Ok(ContrastLimits::Single(estimate(array, 0, samples, &mut self.rng)?))
        }
    }

    fn build_record(&mut self, name: String, array: LoadedArray) -> Result<DisplayRecord> {
        let array = normalize(array)?;
        let contrast_limits = self.contrast_limits(&array)?;
        let channel_axis = (array.ndim() == 4).then_some(CHANNEL_AXIS);
        Ok(DisplayRecord {
            name,
            array,
            contrast_limits,
            channel_axis,
        })
    }

    /// Read one file, reporting variables that could not be turned into records
    ///
    /// # Errors
    ///
    /// Returns file-level failures: `IoError`, `FormatError`, or HDF5 errors on open.
    pub fn read_path_report<P: AsRef<Path>>(&mut self, path: P) -> Result<FileReport> {
        let path = path.as_ref();
        let loaded = load_image_variables(path, &self.config)?;
        let mut report = FileReport {
            records: Vec::with_capacity(loaded.arrays.len()),
            skipped: loaded.skipped,
        };
        for (name, array) in loaded.arrays {
            match self.build_record(name.clone(), array) {
                Ok(record) => report.records.push(record),
                Err(e) if e.is_variable_local() => {
                    warn!(var = %name, error = %e, "skipping variable");
                    report.skipped.push(SkippedVariable {
                        name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            path = %path.display(),
            records = report.records.len(),
            skipped = report.skipped.len(),
            "read MAT-file"
        );
        Ok(report)
    }

    /// Read one file into display records
    ///
    /// # Errors
    ///
    /// See [`MatImageReader::read_path_report`].
    pub fn read_path<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<DisplayRecord>> {
        Ok(self.read_path_report(path)?.records)
    }

    /// Read files in order and flatten their records
    ///
    /// Returns `Ok(None)` when no variable in any file yields a record.
    ///
    /// # Errors
    ///
    /// The first file-level failure aborts the whole request.
    pub fn read_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<Option<Vec<DisplayRecord>>> {
        let mut records = Vec::new();
        for path in paths {
            records.extend(self.read_path(path)?);
        }
        Ok((!records.is_empty()).then_some(records))
    }
}

/// Read `paths` with the default configuration
///
/// # Errors
///
/// See [`MatImageReader::read_paths`].
pub fn read_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Option<Vec<DisplayRecord>>> {
    MatImageReader::default().read_paths(paths)
}

/// Reader entry point returned by [`get_reader`]
pub type ReaderFunction = fn(&[PathBuf]) -> Result<Option<Vec<DisplayRecord>>>;

fn reader_function(paths: &[PathBuf]) -> Result<Option<Vec<DisplayRecord>>> {
    read_paths(paths)
}

/// Return a reader if the first path looks like a MAT-file
///
/// Only the suffix is checked; the container format itself is detected from
/// content when reading.
pub fn get_reader<P: AsRef<Path>>(paths: &[P]) -> Option<ReaderFunction> {
    let first = paths.first()?;
    let accepted = first
        .as_ref()
        .to_str()
        .is_some_and(|path| path.ends_with(MAT_EXTENSION));
    accepted.then_some(reader_function as ReaderFunction)
}
