//! Entry point for the matimg application.
//! Handles CLI parsing and logging setup, then lists variables or reads images.

use clap::Parser;
use mat_images::metadata::{list_variables, print_records, print_skipped};
use mat_images::parallel::{get_parallel_info, ParallelConfig};
use mat_images::reader::{FileReport, LayerMetadata, MatImageReader};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose);

    let parallel = args
        .threads
        .map_or_else(ParallelConfig::all_cores, ParallelConfig::with_threads);
    parallel.setup_global_pool()?;
    if args.verbose && !args.json {
        println!("{}", get_parallel_info());
    }

    if args.list_vars {
        for path in &args.paths {
            list_variables(path, args.min_size)?;
        }
        return Ok(());
    }

    let mut reader = MatImageReader::new(args.reader_config());
    let mut report = FileReport::default();
    for path in &args.paths {
        let file_report = reader.read_path_report(path)?;
        report.records.extend(file_report.records);
        report.skipped.extend(file_report.skipped);
    }

    if args.json {
        let metadata: Vec<LayerMetadata> = report.records.iter().map(|r| r.metadata()).collect();
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    if report.records.is_empty() {
        println!("No image variables found.");
    } else {
        print_records(&report.records);
    }
    print_skipped(&report.skipped);
    Ok(())
}
