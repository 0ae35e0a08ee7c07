//! Focus-stack grouping engine for StackDealer.
//!
//! Photos shot in quick bursts are clustered by capture time, each burst is
//! moved into its own folder under a reserved "grouped" folder, and a simple
//! filesystem-backed state machine decides whether the next cycle should fetch
//! new photos or group the ones already present. The binary crate wires these
//! pieces to a command line; everything with invariants lives here.

pub mod cluster;
pub mod collaborators;
pub mod config;
pub mod grouper;
pub mod materialize;
pub mod pipeline;
pub mod progress;
pub mod reporting;
pub mod scanner;
pub mod timestamps;
pub mod workflow;

pub use cluster::{cluster, ClusterParams, ClusteringResult, PhotoRecord, Stack};
pub use collaborators::{
    CollaboratorError, CommandFetcher, ImageProcessor, PhotoFetcher, ScriptBridgeProcessor,
};
pub use config::{ConfigError, FetcherSettings, ProcessorSettings, Settings};
pub use grouper::{
    group_folder, GroupError, GroupOutcome, GroupReport, EXIT_FAILURE, EXIT_GROUPED,
    EXIT_NO_FILES, EXIT_NO_GROUPS,
};
pub use materialize::{
    materialize, stack_folder_name, MaterializeError, MaterializeOutcome, MaterializeStats,
};
pub use pipeline::{run, Collaborators, PipelineError, PipelineReport, Processing};
pub use reporting::{print_summary, write_json, ReportingError};
pub use scanner::{default_extensions, list_image_files, scan, ScanSummary};
pub use timestamps::{ExifTimestampReader, TimestampError, TimestampReader};
pub use workflow::{decide, folder_state, Action, FolderState, WorkFolder, WorkflowError};
