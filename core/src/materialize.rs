//! Commits a clustering result to disk.
//!
//! Layout produced inside the source folder:
//!
//! ```text
//! <source>/<grouped>/<first>_to_<last>/<photo files>
//! ```
//!
//! The grouped folder doubles as the "already processed" marker, so it must
//! not exist beforehand. Every move is checked individually and the first
//! violation aborts the whole run. Files moved before the failure stay where
//! they are; nothing is rolled back.

use crate::cluster::Stack;
use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Joins the first and last photo stems in a stack folder name.
pub const STACK_NAME_SEPARATOR: &str = "_to_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeStats {
    pub folders_created: usize,
    pub files_moved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Committed {
        grouped_root: PathBuf,
        stats: MaterializeStats,
    },
    /// There were no stacks; nothing was created.
    NothingToDo,
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("{} already exists; this folder was already processed", path.display())]
    AlreadyProcessed { path: PathBuf },
    #[error("stack folder {} already exists", path.display())]
    StackFolderExists { path: PathBuf },
    #[error("source file {} not found", path.display())]
    SourceMissing { path: PathBuf },
    #[error("destination {} already exists; refusing to overwrite", path.display())]
    DestinationExists { path: PathBuf },
    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Name of the folder a stack is moved into, e.g. `IMG_0001_to_IMG_0007`.
pub fn stack_folder_name(stack: &Stack) -> String {
    format!(
        "{}{}{}",
        strip_extension(&stack.first().name),
        STACK_NAME_SEPARATOR,
        strip_extension(&stack.last().name)
    )
}

fn strip_extension(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
}

/// Moves every stack's files from `source_dir` into
/// `source_dir/grouped_folder_name/<stack folder>`.
pub fn materialize(
    stacks: &[Stack],
    source_dir: &Path,
    grouped_folder_name: &str,
    progress_bar: &ProgressBar,
) -> Result<MaterializeOutcome, MaterializeError> {
    if stacks.is_empty() {
        return Ok(MaterializeOutcome::NothingToDo);
    }

    let grouped_root = source_dir.join(grouped_folder_name);
    if grouped_root.exists() {
        return Err(MaterializeError::AlreadyProcessed { path: grouped_root });
    }
    create_dir(&grouped_root)?;
    info!(path = %grouped_root.display(), "created grouped folder");

    let total: usize = stacks.iter().map(Stack::len).sum();
    progress_bar.set_length(total as u64);

    let mut stats = MaterializeStats::default();
    for stack in stacks {
        let stack_dir = grouped_root.join(stack_folder_name(stack));
        if stack_dir.exists() {
            return Err(MaterializeError::StackFolderExists { path: stack_dir });
        }
        create_dir(&stack_dir)?;
        stats.folders_created += 1;

        for name in stack.names() {
            move_file(&source_dir.join(name), &stack_dir.join(name))?;
            stats.files_moved += 1;
            progress_bar.inc(1);
            progress_bar.set_message(format!("Moving: {}", name));
        }
        debug!(folder = %stack_dir.display(), files = stack.len(), "stack materialized");
    }

    Ok(MaterializeOutcome::Committed {
        grouped_root,
        stats,
    })
}

fn create_dir(path: &Path) -> Result<(), MaterializeError> {
    fs::create_dir(path).map_err(|source| MaterializeError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn move_file(source: &Path, destination: &Path) -> Result<(), MaterializeError> {
    if !source.exists() {
        return Err(MaterializeError::SourceMissing {
            path: source.to_path_buf(),
        });
    }
    if destination.exists() {
        return Err(MaterializeError::DestinationExists {
            path: destination.to_path_buf(),
        });
    }
    fs::rename(source, destination).map_err(|error| MaterializeError::Move {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: error,
    })
}
