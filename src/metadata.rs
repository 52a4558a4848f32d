//! MAT-file catalog inspection and record summaries
//!
//! This module lists the variables of a container together with their shape,
//! value kind and whether they pass the image heuristic, and prints summaries of
//! the display records a read produced.

use crate::array::element_count;
use crate::container::Container;
use crate::data_source::{SkippedVariable, VariableCatalog, VariableDescriptor};
use crate::errors::Result;
use crate::predicate::is_image_with;
use crate::reader::DisplayRecord;
use crate::statistics::ContrastLimits;
use std::path::Path;

/// Catalog entry with the image verdict attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMetadata {
    pub name: String,
    pub shape: Vec<usize>,
    pub kind: String,
    pub is_image: bool,
    /// Saturates at `usize::MAX` for corrupt shapes
    pub total_elements: usize,
    /// `None` when the variable is not a plain numeric array
    pub estimated_size_bytes: Option<usize>,
}

impl VariableMetadata {
    pub fn from_descriptor(var: &VariableDescriptor, min_image_size: usize) -> Self {
        let count = element_count(&var.shape);
        Self {
            name: var.name.clone(),
            shape: var.shape.clone(),
            kind: var
                .dtype
                .map_or_else(|| var.kind().as_str().to_string(), |d| d.to_string()),
            is_image: is_image_with(&var.shape, min_image_size),
            total_elements: count.unwrap_or(usize::MAX),
            estimated_size_bytes: var
                .dtype
                .and_then(|d| count?.checked_mul(d.item_size())),
        }
    }
}

fn format_shape(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(ToString::to_string).collect();
    format!("({})", dims.join(" × "))
}

fn format_limits(limits: &ContrastLimits) -> String {
    let pairs: Vec<String> = limits
        .pairs()
        .iter()
        .map(|[min, max]| format!("[{}, {}]", min, max))
        .collect();
    pairs.join(", ")
}

/// Describe every variable of a MAT-file, sorted by name
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its catalog read.
pub fn describe_variables<P: AsRef<Path>>(path: P, min_image_size: usize) -> Result<Vec<VariableMetadata>> {
    describe(&Container::open(path)?, min_image_size)
}

fn describe(container: &Container, min_image_size: usize) -> Result<Vec<VariableMetadata>> {
    let mut variables: Vec<VariableMetadata> = container
        .variables()?
        .iter()
        .map(|var| VariableMetadata::from_descriptor(var, min_image_size))
        .collect();
    variables.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(variables)
}

/// Lists all variables of a MAT-file in a clean, organized format.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its catalog read.
pub fn list_variables<P: AsRef<Path>>(path: P, min_image_size: usize) -> Result<()> {
    let path = path.as_ref();
    let container = Container::open(path)?;
    println!("\n📁 {} [{}]", path.display(), container.format().name());
    println!("=============");

    let variables = describe(&container, min_image_size)?;
    if variables.is_empty() {
        println!("   (No variables found)");
        return Ok(());
    }

    for var in variables {
        let marker = if var.is_image { "🖼️ " } else { "  " };
        let size = var
            .estimated_size_bytes
            .map_or_else(String::new, |bytes| format!(", {} KiB", bytes.div_ceil(1024)));
        println!(
            "   {} {} {} {}{}",
            marker,
            var.name,
            format_shape(&var.shape),
            var.kind,
            size
        );
    }
    Ok(())
}

/// Prints one line per display record
pub fn print_records(records: &[DisplayRecord]) {
    println!("\n🖼️  Images");
    println!("==========");
    for record in records {
        let storage = if record.array.is_lazy() { "lazy" } else { "eager" };
        let channels = record
            .channel_axis
            .map_or_else(String::new, |axis| format!(", channel_axis={}", axis));
        println!(
            "   {} {} {} ({}){}",
            record.name,
            format_shape(&record.array.shape()),
            record.array.dtype(),
            storage,
            channels
        );
        println!("      contrast limits: {}", format_limits(&record.contrast_limits));
    }
}

/// Prints variables that were skipped while reading
pub fn print_skipped(skipped: &[SkippedVariable]) {
    if skipped.is_empty() {
        return;
    }
    println!("\n⚠️  Skipped variables");
    println!("=====================");
    for var in skipped {
        println!("   {}: {}", var.name, var.reason);
    }
}
