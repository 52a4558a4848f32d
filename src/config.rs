//! Reader configuration
//!
//! [`ReaderConfig`] gathers every tunable of the read pipeline. Defaults match the
//! behavior expected by image viewers: arrays need two axes longer than 20 to count
//! as images, and contrast limits are estimated from 100 samples.

use crate::chunking::{DEFAULT_AUTO_CHUNK_BYTES, DEFAULT_SLICE_CHUNK};
use crate::predicate::DEFAULT_MIN_SIZE;
use crate::statistics::contrast::DEFAULT_CONTRAST_SAMPLES;

/// Settings for one read pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Axes must be strictly longer than this to count towards an image
    pub min_image_size: usize,
    /// Samples drawn for contrast estimation, `None` reads every element
    pub contrast_samples: Option<usize>,
    /// Chunk length used in place of one-slice chunks along the slice axis
    pub slice_chunk_floor: usize,
    /// Chunk budget for HDF5 datasets stored without chunking
    pub auto_chunk_bytes: usize,
    /// Seed for contrast sampling; unseeded readers draw from system entropy
    pub seed: Option<u64>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            min_image_size: DEFAULT_MIN_SIZE,
            contrast_samples: Some(DEFAULT_CONTRAST_SAMPLES),
            slice_chunk_floor: DEFAULT_SLICE_CHUNK,
            auto_chunk_bytes: DEFAULT_AUTO_CHUNK_BYTES,
            seed: None,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_min_image_size(mut self, min_image_size: usize) -> Self {
        self.min_image_size = min_image_size;
        self
    }

    /// Set the sample budget; `None` makes contrast limits exact
    #[must_use]
    pub fn with_contrast_samples(mut self, samples: Option<usize>) -> Self {
        self.contrast_samples = samples;
        self
    }

    #[must_use]
    pub fn with_slice_chunk_floor(mut self, floor: usize) -> Self {
        self.slice_chunk_floor = floor.max(1);
        self
    }

    #[must_use]
    pub fn with_auto_chunk_bytes(mut self, bytes: usize) -> Self {
        self.auto_chunk_bytes = bytes.max(1);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
