use clap::{ArgAction, Args, Parser, Subcommand};
use stackdealer_core::{ConfigError, Settings};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "stackdealer",
    version,
    about = "Groups focus-stacking bursts into folders and drives the ingest pipeline"
)]
pub struct Cli {
    /// Settings file (TOML). Defaults to ./stackdealer.toml, then the user config dir.
    #[arg(long, global = true, env = "STACKDEALER_CONFIG")]
    pub config: Option<PathBuf>,

    /// More log output; repeat for trace level.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only warnings and errors, no progress bar.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decide, fetch, group and process one work folder.
    Run(RunArgs),
    /// Group the photos of one folder. Exit status: 0 grouped, 1 no usable
    /// photos, 2 no stacks formed, 3 error.
    Group(GroupArgs),
    /// Print the next workflow action without changing anything but the
    /// storage root.
    Decide(DecideArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    #[command(flatten)]
    pub grouping: GroupingOverrides,

    /// Write a JSON grouping report to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct GroupArgs {
    /// Folder holding the photos to group.
    pub folder: PathBuf,

    #[command(flatten)]
    pub grouping: GroupingOverrides,

    /// Write a JSON grouping report to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DecideArgs {
    #[arg(long)]
    pub storage_root: Option<PathBuf>,
}

/// Command line values that take precedence over the settings file.
#[derive(Debug, Default, Args)]
pub struct GroupingOverrides {
    /// Largest gap in seconds between photos of one stack.
    #[arg(long)]
    pub max_delta: Option<f64>,

    /// Shortest run kept as a stack.
    #[arg(long)]
    pub min_len: Option<usize>,

    /// Stacks longer than this are reported.
    #[arg(long)]
    pub warn_len: Option<usize>,

    /// Name of the grouped output folder.
    #[arg(long)]
    pub grouped_folder: Option<String>,
}

impl GroupingOverrides {
    pub fn apply(&self, mut settings: Settings) -> Result<Settings, ConfigError> {
        if let Some(max_delta) = self.max_delta {
            settings.max_time_delta = max_delta;
        }
        if let Some(min_len) = self.min_len {
            settings.min_stack_len = min_len;
        }
        if let Some(warn_len) = self.warn_len {
            settings.warn_stack_len = warn_len;
        }
        if let Some(name) = &self.grouped_folder {
            settings.grouped_folder_name = name.clone();
        }
        settings.validate()?;
        Ok(settings)
    }
}
