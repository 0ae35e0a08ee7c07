//! External programs the pipeline hands work to.
//!
//! Both collaborators are blocking calls without a timeout; a hang stalls the
//! pipeline. Their output is forwarded to the log and not interpreted.

use crate::config::{FetcherSettings, ProcessorSettings};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;
use tracing::{debug, info, warn};

const SCRIPT_BRIDGE: &str = "osascript";

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("cannot start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} exited with {status}: {stderr}", program.display())]
    Failed {
        program: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("script {} not found", path.display())]
    ScriptMissing { path: PathBuf },
}

/// Populates a folder with recently taken photos.
pub trait PhotoFetcher {
    fn fetch(&self, destination: &Path, lookback_hours: u32) -> Result<(), CollaboratorError>;
}

/// Runs the focus-stacking application over a grouped folder.
pub trait ImageProcessor {
    fn process(&self, script: &Path, grouped_path: &Path) -> Result<(), CollaboratorError>;
}

/// Runs `program [args..] <destination> <lookback_hours>`.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandFetcher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl From<&FetcherSettings> for CommandFetcher {
    fn from(settings: &FetcherSettings) -> Self {
        Self::new(settings.program.clone(), settings.args.clone())
    }
}

impl PhotoFetcher for CommandFetcher {
    fn fetch(&self, destination: &Path, lookback_hours: u32) -> Result<(), CollaboratorError> {
        info!(
            destination = %destination.display(),
            lookback_hours,
            "fetching photos"
        );
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(destination)
            .arg(lookback_hours.to_string());
        run(&self.program, command)
    }
}

/// Asks an application to run a script through `osascript`.
#[derive(Debug, Clone)]
pub struct ScriptBridgeProcessor {
    application: String,
    quit_after: bool,
    bridge: PathBuf,
}

impl ScriptBridgeProcessor {
    pub fn new(application: impl Into<String>, quit_after: bool) -> Self {
        Self {
            application: application.into(),
            quit_after,
            bridge: PathBuf::from(SCRIPT_BRIDGE),
        }
    }

    /// Uses another bridge executable instead of `osascript`.
    pub fn with_bridge(mut self, bridge: impl Into<PathBuf>) -> Self {
        self.bridge = bridge.into();
        self
    }

    fn bridge_command(&self, statement: String) -> Command {
        let mut command = Command::new(&self.bridge);
        command.arg("-e").arg(statement);
        command
    }
}

impl From<&ProcessorSettings> for ScriptBridgeProcessor {
    fn from(settings: &ProcessorSettings) -> Self {
        Self::new(settings.application.clone(), settings.quit_after)
    }
}

impl ImageProcessor for ScriptBridgeProcessor {
    fn process(&self, script: &Path, grouped_path: &Path) -> Result<(), CollaboratorError> {
        if !script.is_file() {
            return Err(CollaboratorError::ScriptMissing {
                path: script.to_path_buf(),
            });
        }
        info!(
            application = %self.application,
            script = %script.display(),
            folder = %grouped_path.display(),
            "running processing script"
        );
        let statement = run_script_statement(&self.application, script, grouped_path);
        run(&self.bridge, self.bridge_command(statement))?;

        if self.quit_after {
            let statement = format!("tell application \"{}\" to quit", escape(&self.application));
            if let Err(error) = run(&self.bridge, self.bridge_command(statement)) {
                warn!(%error, application = %self.application, "could not quit application");
            }
        }
        Ok(())
    }
}

/// AppleScript statement that runs `script` with `grouped_path` as its only
/// argument.
pub fn run_script_statement(application: &str, script: &Path, grouped_path: &Path) -> String {
    format!(
        "tell application \"{}\" to do javascript of file \"{}\" with arguments {{\"{}\"}}",
        escape(application),
        escape(&script.to_string_lossy()),
        escape(&grouped_path.to_string_lossy())
    )
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn run(program: &Path, mut command: Command) -> Result<(), CollaboratorError> {
    let args: Vec<OsString> = command.get_args().map(OsString::from).collect();
    debug!(program = %program.display(), ?args, "running collaborator");
    let Output {
        status,
        stdout,
        stderr,
    } = command.output().map_err(|source| CollaboratorError::Spawn {
        program: program.to_path_buf(),
        source,
    })?;

    for line in String::from_utf8_lossy(&stdout).lines().filter(|l| !l.is_empty()) {
        info!(program = %program.display(), "{}", line);
    }
    let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
    if !status.success() {
        return Err(CollaboratorError::Failed {
            program: program.to_path_buf(),
            status,
            stderr,
        });
    }
    if !stderr.is_empty() {
        warn!(program = %program.display(), "{}", stderr);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn statement_quotes_paths() {
        let statement = run_script_statement(
            "Adobe Photoshop 2024",
            Path::new("/scripts/stacker.jsx"),
            Path::new("/photos/!newstack/fs"),
        );
        assert_eq!(
            statement,
            "tell application \"Adobe Photoshop 2024\" to do javascript of file \
             \"/scripts/stacker.jsx\" with arguments {\"/photos/!newstack/fs\"}"
        );
    }

    #[test]
    fn statement_escapes_quotes() {
        let statement = run_script_statement("App", Path::new("a\"b.jsx"), Path::new("/x"));
        assert!(statement.contains("a\\\"b.jsx"));
    }

    #[test]
    fn missing_script_is_reported() {
        let dir = tempdir().unwrap();
        let processor = ScriptBridgeProcessor::new("App", false);
        let error = processor
            .process(&dir.path().join("none.jsx"), dir.path())
            .unwrap_err();
        assert!(matches!(error, CollaboratorError::ScriptMissing { .. }));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let dir = tempdir().unwrap();
        let fetcher = CommandFetcher::new(dir.path().join("no-such-fetcher"), Vec::new());
        let error = fetcher.fetch(dir.path(), 24).unwrap_err();
        assert!(matches!(error, CollaboratorError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn fetcher_receives_destination_and_hours() {
        let dir = tempdir().unwrap();
        let fetcher = CommandFetcher::new(
            "sh",
            vec![
                String::from("-c"),
                String::from("printf %s \"$1\" > \"$0/hours.txt\""),
            ],
        );
        fetcher.fetch(dir.path(), 36).unwrap();
        let written = fs::read_to_string(dir.path().join("hours.txt")).unwrap();
        assert_eq!(written, "36");
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_is_an_error() {
        let dir = tempdir().unwrap();
        let fetcher = CommandFetcher::new(
            "sh",
            vec![String::from("-c"), String::from("echo nope >&2; exit 3")],
        );
        match fetcher.fetch(dir.path(), 1).unwrap_err() {
            CollaboratorError::Failed { stderr, status, .. } => {
                assert_eq!(stderr, "nope");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn processor_succeeds_when_bridge_succeeds() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("stacker.jsx");
        fs::write(&script, b"// script").unwrap();
        let processor = ScriptBridgeProcessor::new("Stacker", true).with_bridge("echo");
        processor.process(&script, dir.path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn processor_reports_bridge_failure() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("stacker.jsx");
        fs::write(&script, b"// script").unwrap();
        let processor = ScriptBridgeProcessor::new("Stacker", false).with_bridge("false");
        let error = processor.process(&script, dir.path()).unwrap_err();
        assert!(matches!(error, CollaboratorError::Failed { .. }));
    }
}
