use crate::cluster::{
    ClusterParams, DEFAULT_MAX_TIME_DELTA, DEFAULT_MIN_STACK_LEN, DEFAULT_WARN_STACK_LEN,
};
use crate::scanner::default_extensions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::Duration;
use tracing::debug;

/// File name looked up in the working directory and the user config dir.
pub const DEFAULT_CONFIG_FILE: &str = "stackdealer.toml";

/// One day; anything larger is certainly a unit mistake.
const MAX_TIME_DELTA_LIMIT: f64 = 86_400.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// External program that exports recent photos into a folder.
///
/// It is invoked as `program [args..] <destination> <lookback_hours>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetcherSettings {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Application driven through the scripting bridge once stacks exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorSettings {
    /// Application name as the scripting bridge knows it.
    pub application: String,
    /// Script the application runs against the grouped folder.
    pub script: PathBuf,
    /// Ask the application to quit after the script finishes.
    #[serde(default = "default_quit_after")]
    pub quit_after: bool,
}

fn default_quit_after() -> bool {
    true
}

/// Every field has a default, so a file only lists the values that differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Largest gap in seconds between two photos of one stack.
    pub max_time_delta: f64,
    pub min_stack_len: usize,
    pub warn_stack_len: usize,
    pub storage_root: Option<PathBuf>,
    pub folder_base_pattern: String,
    pub grouped_folder_name: String,
    pub supported_extensions: Vec<String>,
    /// How far back the fetcher looks for new photos.
    pub lookback_hours: u32,
    pub fetcher: Option<FetcherSettings>,
    pub processor: Option<ProcessorSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_time_delta: DEFAULT_MAX_TIME_DELTA.as_seconds_f64(),
            min_stack_len: DEFAULT_MIN_STACK_LEN,
            warn_stack_len: DEFAULT_WARN_STACK_LEN,
            storage_root: None,
            folder_base_pattern: String::from("!newstack"),
            grouped_folder_name: String::from("fs"),
            supported_extensions: default_extensions(),
            lookback_hours: 24,
            fetcher: None,
            processor: None,
        }
    }
}

impl Settings {
    /// Loads and validates settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Loads the first config file found among the default locations, or
    /// returns defaults when there is none.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match default_config_paths().into_iter().find(|path| path.is_file()) {
            Some(path) => Self::load(path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_TIME_DELTA_LIMIT).contains(&self.max_time_delta) {
            return Err(invalid(
                "max_time_delta",
                format!(
                    "must be between 0 and {} seconds, got {}",
                    MAX_TIME_DELTA_LIMIT, self.max_time_delta
                ),
            ));
        }
        if self.min_stack_len < 1 {
            return Err(invalid("min_stack_len", "must be at least 1".to_string()));
        }
        if self.folder_base_pattern.trim_start_matches('/').is_empty() {
            return Err(invalid("folder_base_pattern", "must not be empty".to_string()));
        }
        validate_folder_name("grouped_folder_name", &self.grouped_folder_name)?;
        if self.supported_extensions.is_empty() {
            return Err(invalid(
                "supported_extensions",
                "at least one extension is required".to_string(),
            ));
        }
        if let Some(ext) = self
            .supported_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(invalid(
                "supported_extensions",
                format!("{:?} must be a bare suffix such as \"jpg\"", ext),
            ));
        }
        Ok(())
    }

    pub fn cluster_params(&self) -> ClusterParams {
        ClusterParams {
            max_delta: Duration::seconds_f64(self.max_time_delta),
            min_len: self.min_stack_len,
            warn_len: self.warn_stack_len,
        }
    }

    pub fn storage_root(&self) -> Result<&Path, ConfigError> {
        self.storage_root
            .as_deref()
            .ok_or_else(|| invalid("storage_root", "is required to run the pipeline".to_string()))
    }
}

fn validate_folder_name(key: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(invalid(key, format!("{:?} is not a folder name", name)));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid(key, format!("{:?} must not contain path separators", name)));
    }
    Ok(())
}

fn invalid(key: &'static str, message: String) -> ConfigError {
    ConfigError::InvalidValue { key, message }
}

/// `./stackdealer.toml`, then `<config dir>/stackdealer/stackdealer.toml`.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("stackdealer");
        dir.push(DEFAULT_CONFIG_FILE);
        paths.push(dir);
    }
    paths
}
