//! Configuration loading
//!
//! Handles parsing of the optional `config.toml` in the user's config
//! directory (`~/.config/todo/config.toml` on Linux).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::output::Format;

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "TODO_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Output format used when `--format` is not given
    #[serde(default = "default_format")]
    pub format: String,

    /// Directory names that mark a project root
    #[serde(default = "default_project_markers")]
    pub project_markers: Vec<String>,

    /// Keep the project store listed in `.gitignore`
    #[serde(default = "default_true")]
    pub manage_gitignore: bool,

    /// How long to wait for the store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Shortest reference tried as a uid prefix
    #[serde(default = "default_short_id_min_len")]
    pub short_id_min_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: default_format(),
            project_markers: default_project_markers(),
            manage_gitignore: true,
            lock_timeout_ms: default_lock_timeout_ms(),
            short_id_min_len: default_short_id_min_len(),
        }
    }
}

fn default_format() -> String {
    Format::Terminal.as_str().to_string()
}

fn default_project_markers() -> Vec<String> {
    vec![".git".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

fn default_short_id_min_len() -> usize {
    1
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|err| {
            Error::InvalidConfig(format!("{}: {}", path.display(), err.message()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the user configuration, or defaults when there is none
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            Some(path) if std::env::var_os(CONFIG_ENV).is_some() => Err(Error::InvalidConfig(
                format!("{CONFIG_ENV} points at a missing file: {}", path.display()),
            )),
            _ => Ok(Self::default()),
        }
    }

    /// `$TODO_CONFIG`, else `<config dir>/todo/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("todo").join("config.toml"))
    }

    pub fn default_format(&self) -> Result<Format> {
        self.format.parse()
    }

    fn validate(&self) -> Result<()> {
        self.format
            .parse::<Format>()
            .map_err(|_| Error::InvalidConfig(format!("format: unknown format '{}'", self.format)))?;

        if self.project_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "project_markers: entries cannot be empty".to_string(),
            ));
        }
        if self
            .project_markers
            .iter()
            .any(|m| m.contains('/') || m.contains('\\'))
        {
            return Err(Error::InvalidConfig(
                "project_markers: entries must be plain names".to_string(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if !(1..=32).contains(&self.short_id_min_len) {
            return Err(Error::InvalidConfig(
                "short_id_min_len must be between 1 and 32".to_string(),
            ));
        }
        Ok(())
    }
}
