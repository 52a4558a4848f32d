//! Defines command-line interface options using `clap` for the matimg application.

use clap::Parser;
use std::path::PathBuf;

/// A CLI tool for finding and inspecting images stored in MATLAB .mat files
#[derive(Parser, Debug)]
#[command(
    version,
    name = "matimg",
    about = "Find image variables in MATLAB .mat files and estimate their display range"
)]
pub struct Args {
    /// MAT-files to read (Level 5 or v7.3)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// List every variable with its shape, type and image verdict instead of reading images
    #[arg(long)]
    pub list_vars: bool,

    /// Number of points (2D) or slices (3D and up) sampled for contrast limits
    #[arg(long, default_value_t = mat_images::statistics::DEFAULT_CONTRAST_SAMPLES, conflicts_with = "exhaustive")]
    pub samples: usize,

    /// Compute exact contrast limits by reading every element
    #[arg(long)]
    pub exhaustive: bool,

    /// Axes must be longer than this to count towards an image
    #[arg(long, default_value_t = mat_images::predicate::DEFAULT_MIN_SIZE)]
    pub min_size: usize,

    /// Seed for reproducible contrast sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Print display metadata as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Reader settings selected on the command line
    pub fn reader_config(&self) -> mat_images::ReaderConfig {
        let samples = (!self.exhaustive).then_some(self.samples);
        let config = mat_images::ReaderConfig::default()
            .with_min_image_size(self.min_size)
            .with_contrast_samples(samples);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}
