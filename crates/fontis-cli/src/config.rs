//! External tool configuration.
//!
//! Resolution order:
//! 1. `--config <path>`, which must exist and parse
//! 2. XDG config dir (`~/.config/fontis/config.toml`)
//! 3. `/etc/fontis/config.toml`
//! 4. Built-in defaults
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::{Path, PathBuf};

use fontis_fetch::Tooling;
use serde::Deserialize;

/// Name of the configuration file inside each search directory.
const CONFIG_FILE: &str = "config.toml";

/// A configuration file that exists but cannot be used.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    /// The file could not be read.
    #[error("cannot read configuration {}: {source}", .path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`ToolConfig`].
    #[error("invalid configuration {}: {source}", .path.display())]
    Parse {
        /// The configuration file.
        path: PathBuf,
        /// The TOML error.
        source: toml::de::Error,
    },
}

/// Where the external tools live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ToolConfig {
    /// git binary.
    pub(crate) git: String,
    /// OpenPGP clients to try, in order.
    pub(crate) gpg_candidates: Vec<PathBuf>,
    /// gpgconf binary.
    pub(crate) gpgconf: String,
    /// Cap on the tag listing parsed per revision.
    pub(crate) max_tag_listing_bytes: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let Tooling {
            git,
            gpg_candidates,
            gpgconf,
            max_tag_listing_bytes,
        } = Tooling::default();
        Self {
            git,
            gpg_candidates,
            gpgconf,
            max_tag_listing_bytes,
        }
    }
}

impl ToolConfig {
    /// Load the configuration, honouring an explicit path first.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("no configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse one configuration file.
    pub(crate) fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Convert into the engine's tool locations.
    pub(crate) fn into_tooling(self) -> Tooling {
        Tooling {
            git: self.git,
            gpg_candidates: self.gpg_candidates,
            gpgconf: self.gpgconf,
            max_tag_listing_bytes: self.max_tag_listing_bytes,
        }
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dirs) = directories::ProjectDirs::from("", "", "fontis") {
        paths.push(dirs.config_dir().join(CONFIG_FILE));
    }
    paths.push(PathBuf::from("/etc/fontis").join(CONFIG_FILE));
    paths
}
