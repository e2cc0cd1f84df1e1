//! File-backed, versioned configuration store.
//!
//! Layout under the store root:
//!
//! ```text
//! <name>/current.json          pointer to the latest version
//! <name>/history/0001.json     immutable version entries
//! ```
//!
//! A save writes the history entry first (never overwriting an existing one)
//! and then atomically replaces the pointer, so the pointer only ever names a
//! version that exists on disk.

use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::{ConfigDiff, ConfigError, MigrationConfig};

const CURRENT_FILE: &str = "current.json";
const HISTORY_DIR: &str = "history";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}", missing_message(.name, .version))]
    NotFound { name: String, version: Option<u32> },
    #[error("config store I/O failure at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stored entry {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("version {version} of '{name}' was written by another process")]
    Conflict { name: String, version: u32 },
    #[error("invalid configuration name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

fn missing_message(name: &str, version: &Option<u32>) -> String {
    match version {
        Some(version) => format!("configuration '{name}' has no version {version}"),
        None => format!("configuration '{name}' not found"),
    }
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentPointer {
    version: u32,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    version: u32,
    created_at: DateTime<Utc>,
    checksum: String,
    config: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub name: String,
    pub module: String,
    pub latest_version: u32,
    pub updated_at: DateTime<Utc>,
    pub source_table: String,
    pub target_table: String,
    pub mapping_count: usize,
}

#[derive(Debug)]
pub struct ConfigStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConfigStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_error(&root))?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `config` as a new version and returns its number.
    pub fn save(&self, config: &MigrationConfig) -> Result<u32, StoreError> {
        config.validate()?;
        let name = validate_name(&config.name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.config_dir(name);
        let history_dir = dir.join(HISTORY_DIR);
        fs::create_dir_all(&history_dir).map_err(io_error(&history_dir))?;

        let version = self.latest_history_version(name)?.unwrap_or(0) + 1;
        let config_json = config.to_json_value()?;
        let entry = HistoryEntry {
            version,
            created_at: Utc::now(),
            checksum: checksum(&config_json)?,
            config: config_json,
        };
        let entry_path = history_dir.join(history_file_name(version));
        match write_json(&history_dir, &entry_path, &entry, WriteMode::NoClobber) {
            Ok(()) => {}
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::Conflict {
                    name: name.to_string(),
                    version,
                });
            }
            Err(err) => return Err(err),
        }

        let pointer = CurrentPointer {
            version,
            updated_at: entry.created_at,
        };
        if let Err(err) = write_json(&dir, &dir.join(CURRENT_FILE), &pointer, WriteMode::Replace) {
            if let Err(cleanup) = fs::remove_file(&entry_path) {
                debug!("Failed to remove orphaned entry {entry_path:?}: {cleanup}");
            }
            return Err(err);
        }
        info!("Saved configuration '{name}' as version {version}");
        Ok(version)
    }

    pub fn load_latest(&self, name: &str) -> Result<MigrationConfig, StoreError> {
        let name = validate_name(name)?;
        let pointer = self.read_pointer(name)?;
        self.load_version(name, pointer.version)
    }

    pub fn load_version(&self, name: &str, version: u32) -> Result<MigrationConfig, StoreError> {
        let name = validate_name(name)?;
        let entry = self.read_entry(name, version)?;
        let path = self.entry_path(name, version);
        MigrationConfig::from_json_value(&entry.config).map_err(|err| StoreError::Corrupt {
            path,
            reason: err.to_string(),
        })
    }

    /// Versions of `name`, newest first.
    pub fn history(&self, name: &str) -> Result<Vec<VersionInfo>, StoreError> {
        let name = validate_name(name)?;
        let mut versions = self.history_versions(name)?;
        if versions.is_empty() {
            return Err(StoreError::NotFound {
                name: name.to_string(),
                version: None,
            });
        }
        versions.sort_unstable_by(|a, b| b.cmp(a));
        versions
            .into_iter()
            .map(|version| {
                self.read_entry(name, version).map(|entry| VersionInfo {
                    version: entry.version,
                    created_at: entry.created_at,
                    checksum: entry.checksum,
                })
            })
            .collect()
    }

    /// Every stored configuration, most recently updated first.
    pub fn list(&self) -> Result<Vec<ConfigSummary>, StoreError> {
        let mut summaries = Vec::new();
        for dir_entry in fs::read_dir(&self.root).map_err(io_error(&self.root))? {
            let dir_entry = dir_entry.map_err(io_error(&self.root))?;
            let path = dir_entry.path();
            if !path.is_dir() || !path.join(CURRENT_FILE).is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if validate_name(name).is_err() {
                continue;
            }
            let pointer = self.read_pointer(name)?;
            let config = self.load_version(name, pointer.version)?;
            summaries.push(ConfigSummary {
                name: name.to_string(),
                module: config.module.clone(),
                latest_version: pointer.version,
                updated_at: pointer.updated_at,
                source_table: config.source.to_string(),
                target_table: config.target.to_string(),
                mapping_count: config.mappings.len(),
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.name.cmp(&b.name)));
        Ok(summaries)
    }

    /// Removes `name` together with its whole history.
    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        let name = validate_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = self.config_dir(name);
        if !dir.is_dir() {
            return Err(StoreError::NotFound {
                name: name.to_string(),
                version: None,
            });
        }
        fs::remove_dir_all(&dir).map_err(io_error(&dir))?;
        info!("Deleted configuration '{name}' and its history");
        Ok(())
    }

    pub fn diff(&self, name: &str, from: u32, to: u32) -> Result<ConfigDiff, StoreError> {
        let old = self.load_version(name, from)?;
        let new = self.load_version(name, to)?;
        Ok(ConfigDiff::between(&old, &new))
    }

    /// Per-name lock. Entries nobody else holds are dropped on the way in,
    /// so the map only grows with concurrently active names.
    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    fn config_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn entry_path(&self, name: &str, version: u32) -> PathBuf {
        self.config_dir(name)
            .join(HISTORY_DIR)
            .join(history_file_name(version))
    }

    fn read_pointer(&self, name: &str) -> Result<CurrentPointer, StoreError> {
        let path = self.config_dir(name).join(CURRENT_FILE);
        read_json(&path).map_err(|err| match err {
            StoreError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                StoreError::NotFound {
                    name: name.to_string(),
                    version: None,
                }
            }
            other => other,
        })
    }

    fn read_entry(&self, name: &str, version: u32) -> Result<HistoryEntry, StoreError> {
        let path = self.entry_path(name, version);
        let entry: HistoryEntry = read_json(&path).map_err(|err| match err {
            StoreError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                StoreError::NotFound {
                    name: name.to_string(),
                    version: Some(version),
                }
            }
            other => other,
        })?;
        if entry.version != version {
            return Err(StoreError::Corrupt {
                path,
                reason: format!("entry claims version {}", entry.version),
            });
        }
        let actual = checksum(&entry.config)?;
        if actual != entry.checksum {
            return Err(StoreError::Corrupt {
                path,
                reason: format!("checksum mismatch (stored {}, computed {actual})", entry.checksum),
            });
        }
        Ok(entry)
    }

    fn history_versions(&self, name: &str) -> Result<Vec<u32>, StoreError> {
        let history_dir = self.config_dir(name).join(HISTORY_DIR);
        let entries = match fs::read_dir(&history_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&history_dir)(err)),
        };
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error(&history_dir))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(version) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok())
            {
                versions.push(version);
            }
        }
        Ok(versions)
    }

    fn latest_history_version(&self, name: &str) -> Result<Option<u32>, StoreError> {
        Ok(self.history_versions(name)?.into_iter().max())
    }
}

fn validate_name(name: &str) -> Result<&str, StoreError> {
    let invalid = |reason| StoreError::InvalidName {
        name: name.to_string(),
        reason,
    };
    let mut chars = name.chars();
    match chars.next() {
        None => Err(invalid("name is empty")),
        Some(first) if !first.is_ascii_alphanumeric() => {
            Err(invalid("name must start with a letter or digit"))
        }
        _ if !chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')) => Err(
            invalid("only letters, digits, '_', '-' and '.' are allowed"),
        ),
        _ => Ok(name),
    }
}

fn history_file_name(version: u32) -> String {
    format!("{version:04}.json")
}

/// SHA-256 over the compact JSON rendering of `config`.
fn checksum(config: &JsonValue) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(config).map_err(ConfigError::from)?;
    Ok(Sha256::digest(&bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    NoClobber,
    Replace,
}

fn write_json<T: Serialize>(
    dir: &Path,
    path: &Path,
    value: &T,
    mode: WriteMode,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|err| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let mut temp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
    temp.write_all(&bytes).map_err(io_error(temp.path()))?;
    temp.as_file().sync_all().map_err(io_error(temp.path()))?;
    let persisted = match mode {
        WriteMode::NoClobber => temp.persist_noclobber(path),
        WriteMode::Replace => temp.persist(path),
    };
    persisted.map(|_| ()).map_err(|err| StoreError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(io_error(path))?;
    serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
