use crate::collaborators::{CollaboratorError, ImageProcessor, PhotoFetcher};
use crate::config::{ConfigError, Settings};
use crate::grouper::{group_folder, GroupError, GroupOutcome};
use crate::timestamps::TimestampReader;
use crate::workflow::{decide, Action, WorkFolder, WorkflowError};
use indicatif::ProgressBar;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("no photo fetcher configured; copy photos into {} and run again", folder.display())]
    NoFetcher { folder: PathBuf },
    #[error("photo fetch into {} failed: {source}", folder.display())]
    Fetch {
        folder: PathBuf,
        #[source]
        source: CollaboratorError,
    },
    #[error("grouping {} failed: {source}", folder.display())]
    Group {
        folder: PathBuf,
        #[source]
        source: GroupError,
    },
    #[error("processing {} failed: {source}", folder.display())]
    Process {
        folder: PathBuf,
        #[source]
        source: CollaboratorError,
    },
}

/// The image processor together with the script it runs.
pub struct Processing<'a> {
    pub processor: &'a dyn ImageProcessor,
    pub script: PathBuf,
}

/// Collaborators used by [`run`].
pub struct Collaborators<'a> {
    pub reader: &'a dyn TimestampReader,
    pub fetcher: Option<&'a dyn PhotoFetcher>,
    pub processing: Option<Processing<'a>>,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub action: Action,
    pub folder: WorkFolder,
    pub outcome: GroupOutcome,
    /// True when the image processor ran over the grouped folder.
    pub processed: bool,
}

/// Runs one pipeline cycle against the configured storage root.
pub fn run(
    settings: &Settings,
    collaborators: &Collaborators<'_>,
    progress_bar: &ProgressBar,
) -> Result<PipelineReport, PipelineError> {
    let storage_root = settings.storage_root()?;
    let (action, folder) = decide(
        storage_root,
        &settings.folder_base_pattern,
        &settings.grouped_folder_name,
        &settings.supported_extensions,
    )?;
    info!(%action, folder = %folder.path.display(), "workflow decision");

    if action == Action::AcquirePhotos {
        folder.ensure_exists()?;
        let fetcher = collaborators.fetcher.ok_or_else(|| PipelineError::NoFetcher {
            folder: folder.path.clone(),
        })?;
        fetcher
            .fetch(&folder.path, settings.lookback_hours)
            .map_err(|source| PipelineError::Fetch {
                folder: folder.path.clone(),
                source,
            })?;
    }

    let outcome = group_folder(&folder.path, settings, collaborators.reader, progress_bar)
        .map_err(|source| PipelineError::Group {
            folder: folder.path.clone(),
            source,
        })?;

    let mut processed = false;
    if let GroupOutcome::Grouped(report) = &outcome {
        let grouped_root = report
            .grouped_root
            .clone()
            .unwrap_or_else(|| folder.grouped_path(&settings.grouped_folder_name));
        match &collaborators.processing {
            Some(processing) => {
                processing
                    .processor
                    .process(&processing.script, &grouped_root)
                    .map_err(|source| PipelineError::Process {
                        folder: grouped_root.clone(),
                        source,
                    })?;
                processed = true;
            }
            None => warn!(
                folder = %grouped_root.display(),
                "no image processor configured; stacks left for manual processing"
            ),
        }
    }

    Ok(PipelineReport {
        action,
        folder,
        outcome,
        processed,
    })
}
