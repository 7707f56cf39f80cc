use crate::{
    assemble::ArtifactKind,
    error::{IoContext, TransferError},
    format,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub path: PathBuf,
    pub url: Url,
    pub filetype: ArtifactKind,
    pub size: String,
}

/// Flat YAML document mapping a second-resolution timestamp to an upload.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store an upload under the current time.
    pub fn record(
        &self,
        url: &Url,
        absolute_path: &Path,
        kind: ArtifactKind,
        human_size: &str,
    ) -> Result<(), TransferError> {
        self.record_at(
            format::local_now(),
            HistoryEntry {
                path: absolute_path.to_path_buf(),
                url: url.clone(),
                filetype: kind,
                size: human_size.to_string(),
            },
        )
    }

    /// Read-modify-write of the whole document. Two records made within the
    /// same second share a key and the later one wins.
    pub fn record_at(&self, at: OffsetDateTime, entry: HistoryEntry) -> Result<(), TransferError> {
        let mut document = self.load()?;
        let key = format::history_key(at);
        if document.insert(key.clone(), entry).is_some() {
            warn!("history entry '{key}' was overwritten by a newer upload");
        }
        self.save(&document)?;
        debug!("recorded history entry '{key}' in '{}'", self.path.display());
        Ok(())
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Result<Vec<(String, HistoryEntry)>, TransferError> {
        let mut entries = self.load()?.into_iter().collect::<Vec<_>>();
        entries.sort_by_key(|(key, _)| format::parse_history_key(key));
        Ok(entries)
    }

    /// Size of the history document on disk, or `None` when there is none.
    pub fn disk_size(&self) -> Option<u64> {
        fs::metadata(&self.path).ok().map(|metadata| metadata.len())
    }

    pub fn clear(&self) -> Result<(), TransferError> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(TransferError::io(
                format!("failed to remove '{}'", self.path.display()),
                err,
            )),
            _ => Ok(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, HistoryEntry>, TransferError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(TransferError::io(
                    format!("failed to read '{}'", self.path.display()),
                    err,
                ));
            }
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_yaml::from_str(&contents)?)
    }

    fn save(&self, document: &BTreeMap<String, HistoryEntry>) -> Result<(), TransferError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        fs::write(&self.path, serde_yaml::to_string(document)?)
            .io_context(|| format!("failed to write '{}'", self.path.display()))
    }
}
