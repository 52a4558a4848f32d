//! Min/max reductions and contrast estimation
//!
//! # Organization
//!
//! This module is organized into submodules:
//! - [`operations`]: NaN-skipping extrema and the [`MinMaxReduction`] trait
//! - [`parallel`]: Parallel folds over eager buffers
//! - [`contrast`]: Sampled contrast limits for display

pub mod contrast;
pub mod operations;
pub mod parallel;

// Re-export the main types and functions for convenience
pub use contrast::{estimate, estimate_channels, ContrastLimits, DEFAULT_CONTRAST_SAMPLES};
pub use operations::{MinMax, MinMaxReduction};
pub use parallel::parallel_min_max;
