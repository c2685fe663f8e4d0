//! Configuration loading and validation.
//!
//! Settings are layered with [`figment`], lowest precedence first:
//!
//! 1. compiled defaults,
//! 2. the user's configuration file (`config.toml`, `config.yaml` or
//!    `config.json` in the platform config directory), or an explicit file,
//! 3. environment variables prefixed `REVIVE_` (nested keys joined with
//!    `__`, e.g. `REVIVE_LOG__LEVEL=debug`),
//! 4. command line flags, applied by the binary on the extracted [`Config`].
//!
//! [`Config::resolve`] then validates everything and turns relative or
//! defaulted paths into the absolute [`Settings`] the rest of the workspace
//! works with.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables that override configuration.
pub const ENV_PREFIX: &str = "REVIVE_";
/// Application name used to locate the platform configuration directory.
pub const APPLICATION: &str = "revive";
const CONFIG_FILE_STEM: &str = "config";

/// Raw, layered configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The client's data directory (holds `downloads.config`, `torrents/`
    /// and `active/`).
    pub data_dir: Option<PathBuf>,
    /// The download list document. Relative paths are resolved against
    /// `data_dir`.
    pub downloads_config: PathBuf,
    /// Torrent directory name, relative to the data directory and to every
    /// backup snapshot.
    pub torrents_dir: PathBuf,
    /// Where all output goes. Defaults to a sibling of the data directory
    /// named `<data dir name>-recover`.
    pub recovery_dir: Option<PathBuf>,
    /// Parent directories of dated backup snapshots.
    pub backup_directories: Vec<PathBuf>,
    /// Worker tasks for filename recovery.
    pub simple_workers: usize,
    /// Backup directories scanned concurrently while building the index.
    pub index_concurrency: usize,
    /// Capacity of the filename recovery work queue.
    pub queue_capacity: usize,
    pub log: LogConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            downloads_config: PathBuf::from("downloads.config"),
            torrents_dir: PathBuf::from("torrents"),
            recovery_dir: None,
            backup_directories: Vec::new(),
            simple_workers: 8,
            index_concurrency: 4,
            queue_capacity: 512,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log filter, e.g. `info` or `revive_library=debug`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// Validated configuration with every path made absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub downloads_config: PathBuf,
    /// Relative name of the torrent directory (see [`Config::torrents_dir`]).
    pub torrents_dir: PathBuf,
    pub recovery_dir: PathBuf,
    pub backup_directories: Vec<PathBuf>,
    pub simple_workers: usize,
    pub index_concurrency: usize,
    pub queue_capacity: usize,
    pub log: LogConfig,
}

impl Config {
    /// Build the layered configuration sources.
    ///
    /// With `explicit` set, that file replaces the user configuration file
    /// lookup and must exist.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = merge_file(figment, path)?;
            },
            None => {
                for path in Self::user_files() {
                    tracing::debug!(path = %path.display(), "using configuration file");
                    figment = merge_file(figment, &path)?;
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from every source.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::figment(explicit)?.extract().or_raise(|| ErrorKind::Load)
    }

    /// Configuration files that exist in the platform's config directory.
    fn user_files() -> Vec<PathBuf> {
        let Some(dirs) = ProjectDirs::from("", "", APPLICATION) else {
            return Vec::new();
        };
        ["toml", "yaml", "json"]
            .into_iter()
            .map(|ext| dirs.config_dir().join(format!("{CONFIG_FILE_STEM}.{ext}")))
            .filter(|path| path.is_file())
            .collect()
    }

    /// Validate and resolve into [`Settings`].
    pub fn resolve(&self) -> Result<Settings> {
        if self.simple_workers == 0 {
            exn::bail!(ErrorKind::Invalid("simple_workers"));
        }
        if self.index_concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("index_concurrency"));
        }
        if self.queue_capacity == 0 {
            exn::bail!(ErrorKind::Invalid("queue_capacity"));
        }
        if self.torrents_dir.as_os_str().is_empty() || self.torrents_dir.is_absolute() {
            exn::bail!(ErrorKind::Invalid("torrents_dir"));
        }
        let data_dir = self.data_dir.as_deref().ok_or_raise(|| ErrorKind::Missing("data_dir"))?;
        let data_dir = absolute(data_dir, "data_dir")?;
        let recovery_dir = match &self.recovery_dir {
            Some(dir) => absolute(dir, "recovery_dir")?,
            None => default_recovery_dir(&data_dir)?,
        };
        if recovery_dir == data_dir {
            exn::bail!(ErrorKind::Invalid("recovery_dir"));
        }
        let backup_directories = self
            .backup_directories
            .iter()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| absolute(dir, "backup_directories"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Settings {
            downloads_config: data_dir.join(&self.downloads_config),
            torrents_dir: self.torrents_dir.clone(),
            data_dir,
            recovery_dir,
            backup_directories,
            simple_workers: self.simple_workers,
            index_concurrency: self.index_concurrency,
            queue_capacity: self.queue_capacity,
            log: self.log.clone(),
        })
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let ext = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    Ok(match ext.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

fn absolute(path: &Path, setting: &'static str) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        exn::bail!(ErrorKind::Invalid(setting));
    }
    std::path::absolute(path).or_raise(|| ErrorKind::Invalid(setting))
}

/// `/home/me/.azureus` becomes `/home/me/.azureus-recover`.
fn default_recovery_dir(data_dir: &Path) -> Result<PathBuf> {
    let name = data_dir.file_name().ok_or_raise(|| ErrorKind::Missing("recovery_dir"))?;
    let parent = data_dir.parent().ok_or_raise(|| ErrorKind::Missing("recovery_dir"))?;
    let mut recover = name.to_os_string();
    recover.push("-recover");
    Ok(parent.join(recover))
}
