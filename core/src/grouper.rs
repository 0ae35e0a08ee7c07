use crate::cluster::{cluster, ClusteringResult};
use crate::config::Settings;
use crate::materialize::{materialize, MaterializeError, MaterializeOutcome, MaterializeStats};
use crate::scanner::scan;
use crate::timestamps::{TimestampError, TimestampReader};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Exit status when stacks were materialized.
pub const EXIT_GROUPED: i32 = 0;
/// Exit status when the folder had no image with a usable timestamp.
pub const EXIT_NO_FILES: i32 = 1;
/// Exit status when no run reached the minimum stack length.
pub const EXIT_NO_GROUPS: i32 = 2;
/// Exit status for every fatal error.
pub const EXIT_FAILURE: i32 = 3;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("source folder {} does not exist", path.display())]
    SourceNotFound { path: PathBuf },
    #[error("source path {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// Everything learned while grouping one folder.
#[derive(Debug)]
pub struct GroupReport {
    pub source_dir: PathBuf,
    /// Files that matched a supported extension.
    pub image_files: usize,
    /// Files excluded because their timestamp could not be read.
    pub skipped: Vec<TimestampError>,
    pub clustering: ClusteringResult,
    /// Set once stacks have been moved.
    pub grouped_root: Option<PathBuf>,
    pub stats: MaterializeStats,
}

#[derive(Debug)]
pub enum GroupOutcome {
    /// Stacks were moved into the grouped folder.
    Grouped(GroupReport),
    /// No image file with a usable timestamp was found.
    NoFiles(GroupReport),
    /// Photos were read but none formed a stack.
    NoGroups(GroupReport),
}

impl GroupOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Grouped(_) => EXIT_GROUPED,
            Self::NoFiles(_) => EXIT_NO_FILES,
            Self::NoGroups(_) => EXIT_NO_GROUPS,
        }
    }

    pub fn report(&self) -> &GroupReport {
        match self {
            Self::Grouped(report) | Self::NoFiles(report) | Self::NoGroups(report) => report,
        }
    }

    pub fn has_stacks(&self) -> bool {
        matches!(self, Self::Grouped(_))
    }
}

/// Groups the photos directly inside `source_dir`.
pub fn group_folder<R>(
    source_dir: &Path,
    settings: &Settings,
    reader: &R,
    progress_bar: &ProgressBar,
) -> Result<GroupOutcome, GroupError>
where
    R: TimestampReader + ?Sized,
{
    if !source_dir.exists() {
        return Err(GroupError::SourceNotFound {
            path: source_dir.to_path_buf(),
        });
    }
    if !source_dir.is_dir() {
        return Err(GroupError::NotADirectory {
            path: source_dir.to_path_buf(),
        });
    }

    let summary = scan(
        source_dir,
        &settings.supported_extensions,
        reader,
        progress_bar,
    );
    info!(
        folder = %source_dir.display(),
        images = summary.image_files(),
        usable = summary.records.len(),
        skipped = summary.skipped.len(),
        "read capture timestamps"
    );

    let mut report = GroupReport {
        source_dir: source_dir.to_path_buf(),
        image_files: summary.image_files(),
        skipped: summary.skipped,
        clustering: ClusteringResult::default(),
        grouped_root: None,
        stats: MaterializeStats::default(),
    };
    if summary.records.is_empty() {
        return Ok(GroupOutcome::NoFiles(report));
    }

    report.clustering = cluster(&summary.records, &settings.cluster_params());

    progress_bar.reset();
    match materialize(
        &report.clustering.stacks,
        source_dir,
        &settings.grouped_folder_name,
        progress_bar,
    )? {
        MaterializeOutcome::NothingToDo => Ok(GroupOutcome::NoGroups(report)),
        MaterializeOutcome::Committed {
            grouped_root,
            stats,
        } => {
            info!(
                folders = stats.folders_created,
                files = stats.files_moved,
                "stacks materialized"
            );
            report.grouped_root = Some(grouped_root);
            report.stats = stats;
            Ok(GroupOutcome::Grouped(report))
        }
    }
}
