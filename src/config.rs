use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::models::UserId;
use crate::scheduler::{DEFAULT_MAX_CONFLICT_RETRIES, SchedulerOptions};

/// Config file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "review.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database holding the catalog and review states.
    pub database_path: PathBuf,
    /// Learner the command-line front end acts for.
    pub user_id: i64,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub max_conflict_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("review.sqlite3"),
            user_id: 1,
            log_level: "info".to_string(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl Config {
    /// Loads `.env`, then the TOML file, then `REVIEW_*` environment overrides.
    ///
    /// An explicit `path` must exist; the default `review.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|var| env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies `REVIEW_DATABASE`, `REVIEW_USER`, `REVIEW_LOG` and
    /// `REVIEW_MAX_CONFLICT_RETRIES` as returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(path) = lookup("REVIEW_DATABASE") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("REVIEW_USER") {
            self.user_id = parse_env("REVIEW_USER", value)?;
        }
        if let Some(level) = lookup("REVIEW_LOG") {
            self.log_level = level;
        }
        if let Some(value) = lookup("REVIEW_MAX_CONFLICT_RETRIES") {
            self.max_conflict_retries = parse_env("REVIEW_MAX_CONFLICT_RETRIES", value)?;
        }
        Ok(())
    }

    pub fn user(&self) -> UserId {
        UserId(self.user_id)
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            max_conflict_retries: self.max_conflict_retries,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
