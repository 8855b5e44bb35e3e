//! Configuration for sieve.
//!
//! Config file resolution order:
//! 1. SIEVE_CONFIG environment variable
//! 2. XDG config directory (`~/.config/sieve/config.toml`)
//!
//! A missing file means defaults. Command-line flags override every value.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::extension::{load_manifest_dirs, Registry};
use crate::flavor::{translate_flavor, Flavor, DEFAULT_FLAVOR};
use crate::{Error, Result};

/// sieve configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Regex flavor name used for `regex`/`iregex` (e.g. `emacs`, `grep`).
    #[serde(default = "default_regex_type")]
    pub regex_type: String,

    /// Follow symbolic links while walking.
    #[serde(default)]
    pub follow_links: bool,

    /// Deepest directory level visited; unlimited when absent.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Directories scanned for extension manifests (`*.toml`).
    #[serde(default = "default_extension_dirs")]
    pub extension_dirs: Vec<PathBuf>,

    /// `tracing` filter directive, e.g. `sieve=debug`.
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_regex_type() -> String {
    DEFAULT_FLAVOR.to_string()
}

fn default_extension_dirs() -> Vec<PathBuf> {
    ProjectDirs::from("", "", "sieve")
        .map(|dirs| vec![dirs.data_dir().join("extensions")])
        .unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regex_type: default_regex_type(),
            follow_links: false,
            max_depth: None,
            extension_dirs: default_extension_dirs(),
            log_filter: None,
        }
    }
}

impl Config {
    /// Load config from the resolved location, or defaults.
    pub fn load() -> Result<Self> {
        match resolve_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Flavor named by `regex_type`.
    pub fn flavor(&self) -> Result<Flavor> {
        translate_flavor(&self.regex_type)
    }

    /// Registry built from the manifests in `extension_dirs`.
    pub fn registry(&self) -> Result<Registry> {
        load_manifest_dirs(&self.extension_dirs)
    }
}

/// Resolve the config file path using the standard resolution order.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SIEVE_CONFIG") {
        return Some(PathBuf::from(path));
    }

    ProjectDirs::from("", "", "sieve").map(|dirs| dirs.config_dir().join("config.toml"))
}
