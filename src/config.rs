use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::http::HttpOptions;
use crate::paths::default_config_file_path;

pub(crate) const CONFIG_ENV: &str = "ANISHIFT_CONFIG";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config declares source '{0}' more than once")]
    DuplicateSource(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum SourceConfig {
    Allanime {
        id: String,
        #[serde(default = "default_mode")]
        mode: String,
    },
    Catalog {
        id: String,
        base_url: String,
    },
}

impl SourceConfig {
    pub(crate) fn id(&self) -> &str {
        match self {
            Self::Allanime { id, .. } | Self::Catalog { id, .. } => id,
        }
    }
}

fn default_mode() -> String {
    "sub".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) database_path: Option<PathBuf>,
    pub(crate) min_results: usize,
    pub(crate) max_pages: usize,
    pub(crate) source_priority: Vec<String>,
    pub(crate) http: HttpOptions,
    pub(crate) sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            min_results: 3,
            max_pages: 8,
            source_priority: Vec::new(),
            http: HttpOptions::default(),
            sources: vec![
                SourceConfig::Allanime {
                    id: "allanime-sub".to_string(),
                    mode: "sub".to_string(),
                },
                SourceConfig::Allanime {
                    id: "allanime-dub".to_string(),
                    mode: "dub".to_string(),
                },
            ],
        }
    }
}

impl Config {
    pub(crate) fn from_toml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if seen.contains(&source.id()) {
                return Err(ConfigError::DuplicateSource(source.id().to_string()));
            }
            seen.push(source.id());
        }
        Ok(())
    }

    // Explicit priority first, then any remaining declared sources.
    pub(crate) fn priority(&self) -> Vec<String> {
        let mut priority = self.source_priority.clone();
        for source in &self.sources {
            if !priority.iter().any(|id| id == source.id()) {
                priority.push(source.id().to_string());
            }
        }
        priority
    }
}

pub(crate) fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    default_config_file_path()
}

pub(crate) fn load(cli_arg: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = resolve_config_path(cli_arg) else {
        return Ok(Config::default());
    };

    match fs::read_to_string(&path) {
        Ok(raw) => {
            debug!(path = %path.display(), "loaded config file");
            Config::from_toml(&raw, &path)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && cli_arg.is_none() => {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Config::default())
        }
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}
