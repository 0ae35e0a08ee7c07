//! Work folder discovery and the acquire/group decision.
//!
//! All workflow state lives in the filesystem: a storage root holds work
//! folders named `<base>`, `<base>_1`, `<base>_2`, ... and the contents of the
//! highest one decide what happens next.

use crate::scanner::has_image_files;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// One acquisition/grouping cycle's folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkFolder {
    pub base_name: String,
    pub increment: u32,
    pub path: PathBuf,
}

impl WorkFolder {
    pub fn new(storage_root: &Path, base_name: &str, increment: u32) -> Self {
        let name = folder_name(base_name, increment);
        Self {
            base_name: base_name.to_string(),
            increment,
            path: storage_root.join(name),
        }
    }

    /// Parses `dir_name` as `<base>` or `<base>_<n>`; anything else is `None`.
    pub fn parse(storage_root: &Path, base_name: &str, dir_name: &str) -> Option<Self> {
        Self::parse_with(&name_pattern(base_name), storage_root, base_name, dir_name)
    }

    fn parse_with(
        pattern: &Regex,
        storage_root: &Path,
        base_name: &str,
        dir_name: &str,
    ) -> Option<Self> {
        let captures = pattern.captures(dir_name)?;
        let increment = match captures.get(1) {
            Some(digits) => digits.as_str().parse().ok()?,
            None => 0,
        };
        // Keep the name found on disk; `batch_007` is not `batch_7`.
        Some(Self {
            base_name: base_name.to_string(),
            increment,
            path: storage_root.join(dir_name),
        })
    }

    pub fn name(&self) -> String {
        match self.path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => folder_name(&self.base_name, self.increment),
        }
    }

    /// The folder for the following cycle.
    pub fn next(&self, storage_root: &Path) -> Result<Self, WorkflowError> {
        let increment = self
            .increment
            .checked_add(1)
            .ok_or_else(|| WorkflowError::IncrementExhausted {
                path: self.path.clone(),
            })?;
        Ok(Self::new(storage_root, &self.base_name, increment))
    }

    pub fn grouped_path(&self, grouped_folder_name: &str) -> PathBuf {
        self.path.join(grouped_folder_name)
    }

    /// Creates the folder when it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), WorkflowError> {
        if self.path.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.path).map_err(|source| WorkflowError::CreateFolder {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "created work folder");
        Ok(())
    }
}

fn name_pattern(base_name: &str) -> Regex {
    Regex::new(&format!(r"^{}(?:_(\d+))?$", regex::escape(base_name)))
        .expect("escaped base name is a valid regex")
}

fn folder_name(base_name: &str, increment: u32) -> String {
    if increment == 0 {
        base_name.to_string()
    } else {
        format!("{}_{}", base_name, increment)
    }
}

/// Observed condition of a work folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    NotExists,
    Empty,
    ReadyForGrouper,
    Completed,
}

/// What the pipeline should do with the chosen folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AcquirePhotos,
    GroupPhotos,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcquirePhotos => write!(f, "acquire photos"),
            Self::GroupPhotos => write!(f, "group photos"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("cannot create storage root {}: {source}", path.display())]
    StorageRootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot list storage root {}: {source}", path.display())]
    ListStorageRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("work folder {} disappeared while its state was being read", path.display())]
    FolderVanished { path: PathBuf },
    #[error("work folder {} has the largest possible increment", path.display())]
    IncrementExhausted { path: PathBuf },
    #[error("cannot create work folder {}: {source}", path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Inspects a folder. A grouped-output subfolder wins over everything else.
pub fn folder_state(path: &Path, grouped_folder_name: &str, extensions: &[String]) -> FolderState {
    if !path.is_dir() {
        return FolderState::NotExists;
    }
    if path.join(grouped_folder_name).is_dir() {
        FolderState::Completed
    } else if has_image_files(path, extensions) {
        FolderState::ReadyForGrouper
    } else {
        FolderState::Empty
    }
}

/// Work folders directly under `storage_root`, ascending by increment.
pub fn find_work_folders(
    storage_root: &Path,
    base_name: &str,
) -> Result<Vec<WorkFolder>, WorkflowError> {
    if !storage_root.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(storage_root).map_err(|source| WorkflowError::ListStorageRoot {
        path: storage_root.to_path_buf(),
        source,
    })?;

    let pattern = name_pattern(base_name);
    let mut folders: Vec<WorkFolder> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name();
            WorkFolder::parse_with(&pattern, storage_root, base_name, name.to_str()?)
        })
        .collect();
    folders.sort_by(|a, b| a.increment.cmp(&b.increment).then_with(|| a.path.cmp(&b.path)));
    Ok(folders)
}

/// Chooses the next action and the folder it applies to.
///
/// Creates `storage_root` if it is missing. The work folder itself is not
/// created here; see [`WorkFolder::ensure_exists`].
pub fn decide(
    storage_root: &Path,
    base_pattern: &str,
    grouped_folder_name: &str,
    extensions: &[String],
) -> Result<(Action, WorkFolder), WorkflowError> {
    if !storage_root.exists() {
        fs::create_dir_all(storage_root).map_err(|source| {
            WorkflowError::StorageRootUnavailable {
                path: storage_root.to_path_buf(),
                source,
            }
        })?;
        info!(path = %storage_root.display(), "created storage root");
    }

    let base_name = base_pattern.trim_start_matches('/');
    let folders = find_work_folders(storage_root, base_name)?;
    let Some(latest) = folders.last() else {
        let folder = WorkFolder::new(storage_root, base_name, 0);
        debug!(folder = %folder.path.display(), "no work folders yet");
        return Ok((Action::AcquirePhotos, folder));
    };

    let state = folder_state(&latest.path, grouped_folder_name, extensions);
    debug!(folder = %latest.path.display(), ?state, "latest work folder");
    match state {
        FolderState::Completed => Ok((Action::AcquirePhotos, latest.next(storage_root)?)),
        FolderState::ReadyForGrouper => Ok((Action::GroupPhotos, latest.clone())),
        FolderState::Empty => Ok((Action::AcquirePhotos, latest.clone())),
        FolderState::NotExists => Err(WorkflowError::FolderVanished {
            path: latest.path.clone(),
        }),
    }
}
