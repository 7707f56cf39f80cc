//! Persisted client settings and the on-disk layout of the client's files.

use crate::{
    error::{IoContext, TransferError},
    history::HistoryStore,
};
use serde::{Deserialize, Serialize};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tracing::debug;

const CONFIG_FILE_NAME: &str = "config.yaml";
const HISTORY_FILE_NAME: &str = "history.yaml";

/// Where the client keeps its files.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub history_file: PathBuf,
    /// Scratch space for archives built from several inputs.
    pub work_dir: PathBuf,
}

impl AppPaths {
    pub fn new(config_dir: PathBuf, work_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join(CONFIG_FILE_NAME),
            history_file: config_dir.join(HISTORY_FILE_NAME),
            config_dir,
            work_dir,
        }
    }

    /// Platform defaults, with `config_dir` overriding the configuration directory.
    pub fn resolve(config_dir: Option<PathBuf>) -> Self {
        let config_dir = config_dir.unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(env!("CARGO_PKG_NAME"))
        });
        Self::new(config_dir, env::temp_dir().join(env!("CARGO_PKG_NAME")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory downloads are written to.
    pub download_dir: PathBuf,
    /// Show a desktop notification when a transfer completes.
    pub notify: bool,
    /// Play a sound with notifications.
    pub sound: bool,
    /// Notification icon, empty for the system default.
    pub icon: String,
    /// Copy share links to the clipboard.
    pub clipboard: bool,
    /// Print share links as a QR code.
    pub qrcode: bool,
    /// Record uploads in the history file.
    pub history: bool,
    /// Extract downloaded archives.
    pub unzip: bool,
    /// Check for newer releases on startup.
    pub update_check: bool,
    /// Offer similarly named files when a path does not exist.
    pub suggest_similar: bool,
    /// When the last new-release notice was shown.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update_notice: Option<OffsetDateTime>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            notify: true,
            sound: true,
            icon: String::new(),
            clipboard: true,
            qrcode: true,
            history: true,
            unzip: true,
            update_check: true,
            suggest_similar: true,
            last_update_notice: None,
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Read the configuration at `path`, creating it with defaults on first
    /// run. Keys missing from an existing document are filled with defaults
    /// and written back.
    pub fn load_or_init(path: &Path) -> Result<Self, TransferError> {
        let config = match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => Self::default(),
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("creating default configuration at '{}'", path.display());
                Self::default()
            }
            Err(err) => {
                return Err(TransferError::io(
                    format!("failed to read '{}'", path.display()),
                    err,
                ));
            }
        };
        config.save(path)?;
        Ok(config)
    }

    /// Write the whole document to `path`.
    pub fn save(&self, path: &Path) -> Result<(), TransferError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        fs::write(path, serde_yaml::to_string(self)?)
            .io_context(|| format!("failed to write '{}'", path.display()))
    }
}

/// Everything a command needs: where files live and the current settings.
#[derive(Debug)]
pub struct Session {
    pub paths: AppPaths,
    pub config: Config,
}

impl Session {
    pub fn load(paths: AppPaths) -> Result<Self, TransferError> {
        let config = Config::load_or_init(&paths.config_file)?;
        Ok(Self { paths, config })
    }

    /// Persist the current settings.
    pub fn save(&self) -> Result<(), TransferError> {
        self.config.save(&self.paths.config_file)
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::new(&self.paths.history_file)
    }
}
