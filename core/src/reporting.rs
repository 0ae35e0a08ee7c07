use crate::grouper::{GroupOutcome, GroupReport};
use crate::materialize::stack_folder_name;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const REPORT_VERSION: u32 = 1;

#[derive(Serialize)]
struct GroupingReport {
    version: u32,
    generated_at: String,
    source: String,
    outcome: &'static str,
    image_files: usize,
    grouped_root: Option<String>,
    size_histogram: BTreeMap<usize, usize>,
    discarded_runs: usize,
    discarded_photos: usize,
    stacks: Vec<StackDescriptor>,
    skipped: Vec<SkippedDescriptor>,
}

#[derive(Serialize)]
struct StackDescriptor {
    folder: String,
    first_taken: String,
    last_taken: String,
    oversized: bool,
    files: Vec<String>,
}

#[derive(Serialize)]
struct SkippedDescriptor {
    path: String,
    reason: String,
}

#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("cannot write report {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Prints the per-folder summary and the stack size histogram.
pub fn print_summary(outcome: &GroupOutcome) {
    let report = outcome.report();
    println!(
        "Read {} image files in {}",
        report.image_files,
        report.source_dir.display()
    );
    if !report.skipped.is_empty() {
        println!(
            "Skipped {} files without a usable capture timestamp:",
            report.skipped.len()
        );
        for error in &report.skipped {
            println!("  {}", error);
        }
    }

    match outcome {
        GroupOutcome::NoFiles(_) => println!("No image files with capture timestamps found."),
        GroupOutcome::NoGroups(_) => println!(
            "No stacks formed ({} short runs, {} photos left in place).",
            report.clustering.discarded_runs, report.clustering.discarded_photos
        ),
        GroupOutcome::Grouped(_) => {
            print_histogram(report);
            for &index in &report.clustering.oversized {
                let stack = &report.clustering.stacks[index];
                println!(
                    "Long stack ({} files): {} to {}",
                    stack.len(),
                    stack.first().name,
                    stack.last().name
                );
            }
            println!(
                "{} folders created, {} files moved",
                report.stats.folders_created, report.stats.files_moved
            );
        }
    }
}

fn print_histogram(report: &GroupReport) {
    for (size, count) in &report.clustering.size_histogram {
        println!("Stack size {:>2} files: {} stacks", size, count);
    }
}

/// Writes a JSON description of a grouping run.
pub fn write_json(outcome: &GroupOutcome, output_path: &Path) -> Result<(), ReportingError> {
    let report = build_report(outcome);
    let file = File::create(output_path).map_err(|source| ReportingError::Io {
        path: output_path.to_path_buf(),
        source,
    })?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &report)?;
    Ok(())
}

fn build_report(outcome: &GroupOutcome) -> GroupingReport {
    let report = outcome.report();
    let clustering = &report.clustering;
    let outcome_name = match outcome {
        GroupOutcome::Grouped(_) => "grouped",
        GroupOutcome::NoFiles(_) => "no_files",
        GroupOutcome::NoGroups(_) => "no_groups",
    };

    GroupingReport {
        version: REPORT_VERSION,
        generated_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("unknown")),
        source: report.source_dir.to_string_lossy().into_owned(),
        outcome: outcome_name,
        image_files: report.image_files,
        grouped_root: report
            .grouped_root
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned()),
        size_histogram: clustering.size_histogram.clone(),
        discarded_runs: clustering.discarded_runs,
        discarded_photos: clustering.discarded_photos,
        stacks: clustering
            .stacks
            .iter()
            .enumerate()
            .map(|(index, stack)| StackDescriptor {
                folder: stack_folder_name(stack),
                first_taken: stack.first().timestamp.to_string(),
                last_taken: stack.last().timestamp.to_string(),
                oversized: clustering.oversized.contains(&index),
                files: stack.names().map(String::from).collect(),
            })
            .collect(),
        skipped: report
            .skipped
            .iter()
            .map(|error| SkippedDescriptor {
                path: error.path().to_string_lossy().into_owned(),
                reason: error.to_string(),
            })
            .collect(),
    }
}
