//! Container detection and dispatch
//!
//! A MAT-file is either a classic Level 5 file or a v7.3 HDF5 file. The format is
//! probed from the leading bytes before anything is opened, and the matching
//! reader is then used exclusively:
//!
//! 1. A valid Level 5 header with version `0x0100` is classic.
//! 2. A valid header with any other version (MATLAB writes `0x0200` in front of
//!    v7.3 files) is HDF5, provided an HDF5 signature follows the user block.
//! 3. A bare HDF5 signature at offset 0 is HDF5.
//! 4. Anything else is a `FormatError`.

use crate::classic_io::{ClassicHeader, ClassicReader, HEADER_LEN};
use crate::config::ReaderConfig;
use crate::data_source::{LoadedVariables, VariableCatalog, VariableDescriptor};
use crate::errors::{MatImagesError, Result};
use crate::hdf5_io::Hdf5Reader;
use crate::predicate::is_image_with;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info};

/// HDF5 superblock signature
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// On-disk variant of a MAT-file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Classic,
    Hdf5,
}

impl ContainerFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Classic => "MAT Level 5",
            ContainerFormat::Hdf5 => "MAT v7.3 (HDF5)",
        }
    }
}

/// Look for the HDF5 signature at offset 0, 512, 1024, 2048, ...
fn has_hdf5_signature(file: &mut File, file_len: u64) -> Result<bool> {
    let mut offset = 0u64;
    let mut buf = [0u8; 8];
    while offset + 8 <= file_len {
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        if buf == HDF5_SIGNATURE {
            return Ok(true);
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    Ok(false)
}

/// Detect the format of a MAT-file from its content
///
/// # Errors
///
/// Returns an `IoError` if the file cannot be read and a `FormatError` if it is
/// neither a Level 5 nor an HDF5 MAT-file.
pub fn detect_format<P: AsRef<Path>>(path: P) -> Result<ContainerFormat> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut head = Vec::with_capacity(HEADER_LEN);
    (&mut file).take(HEADER_LEN as u64).read_to_end(&mut head)?;

    let format = match ClassicHeader::parse(&head).and_then(ClassicHeader::check_version) {
        Ok(_) => ContainerFormat::Classic,
        Err(MatImagesError::UnsupportedVersion { version }) => {
            if has_hdf5_signature(&mut file, file_len)? {
                ContainerFormat::Hdf5
            } else {
                return Err(MatImagesError::format(format!(
                    "version 0x{version:04X} header without HDF5 content"
                )));
            }
        }
        Err(MatImagesError::FormatError { .. }) if head.starts_with(&HDF5_SIGNATURE) => {
            ContainerFormat::Hdf5
        }
        Err(e) => return Err(e),
    };
    debug!(path = %path.display(), format = format.name(), "detected container format");
    Ok(format)
}

/// An opened MAT-file of either format
#[derive(Debug)]
pub enum Container {
    Classic(ClassicReader),
    Hdf5(Hdf5Reader),
}

impl Container {
    /// Detect and open a MAT-file with default settings
    ///
    /// # Errors
    ///
    /// See [`detect_format`]; errors from the selected reader are propagated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &ReaderConfig::default())
    }

    /// Detect and open a MAT-file, applying chunking settings from `config`
    ///
    /// # Errors
    ///
    /// See [`detect_format`]; errors from the selected reader are propagated.
    pub fn open_with<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<Self> {
        let path = path.as_ref();
        match detect_format(path)? {
            ContainerFormat::Classic => Ok(Container::Classic(ClassicReader::open(path)?)),
            ContainerFormat::Hdf5 => Ok(Container::Hdf5(
                Hdf5Reader::open(path)?
                    .with_slice_floor(config.slice_chunk_floor)
                    .with_auto_chunk_bytes(config.auto_chunk_bytes),
            )),
        }
    }

    #[must_use]
    pub fn format(&self) -> ContainerFormat {
        match self {
            Container::Classic(_) => ContainerFormat::Classic,
            Container::Hdf5(_) => ContainerFormat::Hdf5,
        }
    }

    fn catalog(&self) -> &dyn VariableCatalog {
        match self {
            Container::Classic(reader) => reader,
            Container::Hdf5(reader) => reader,
        }
    }
}

impl VariableCatalog for Container {
    fn variables(&self) -> Result<Vec<VariableDescriptor>> {
        self.catalog().variables()
    }

    fn load(&self, names: &[String]) -> Result<LoadedVariables> {
        self.catalog().load(names)
    }
}

/// Open `path`, keep the variables whose shape looks like an image and load them
///
/// Classic variables come back eager, HDF5 variables lazy; both are squeezed.
///
/// # Errors
///
/// Returns file-level errors only. Variables that fail individually are listed
/// in [`LoadedVariables::skipped`].
pub fn load_image_variables<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<LoadedVariables> {
    let path = path.as_ref();
    let container = Container::open_with(path, config)?;
    let variables = container.variables()?;
    let candidates: Vec<String> = variables
        .into_iter()
        .filter(|var| {
            let keep = is_image_with(&var.shape, config.min_image_size);
            if !keep {
                debug!(var = %var.name, shape = ?var.shape, "not an image, skipping");
            }
            keep
        })
        .map(|var| var.name)
        .collect();

    let loaded = if candidates.is_empty() {
        LoadedVariables::default()
    } else {
        container.load(&candidates)?
    };
    info!(
        path = %path.display(),
        format = container.format().name(),
        candidates = candidates.len(),
        loaded = loaded.arrays.len(),
        skipped = loaded.skipped.len(),
        "loaded image variables"
    );
    Ok(loaded)
}
