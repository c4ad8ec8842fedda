use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use groupsnap_core::{GroupState, TokenRecord};
use groupsnap_logging::{snap_debug, snap_info};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

/// File name of the queue store inside its state directory.
pub const STORE_FILENAME: &str = ".groupsnap_queue.ron";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("failed to parse queue store {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to serialize queue store: {0}")]
    Serialize(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    token: Option<TokenRecord>,
    #[serde(default)]
    groups: BTreeMap<String, GroupState>,
}

/// Durable mapping from group id to its pending download queue, plus the cached token.
///
/// Every mutation rewrites the backing file atomically while holding the lock,
/// so concurrent removals serialize and a crash leaves the previous file intact.
pub struct QueueStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl QueueStore {
    /// Opens (or starts) the store at `{state_dir}/.groupsnap_queue.ron`.
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        ensure_state_dir(state_dir)?;
        let path = state_dir.join(STORE_FILENAME);
        let data: StoreData = match fs::read_to_string(&path) {
            Ok(text) => ron::from_str(&text).map_err(|err| StoreError::Parse {
                path: path.clone(),
                message: err.to_string(),
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => StoreData::default(),
            Err(err) => return Err(StoreError::Io(err)),
        };
        snap_info!(
            "Opened queue store {:?} ({} groups)",
            path,
            data.groups.len()
        );
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_group(&self, group_id: &str) -> Option<GroupState> {
        self.lock().groups.get(group_id).cloned()
    }

    pub fn group_ids(&self) -> Vec<String> {
        self.lock().groups.keys().cloned().collect()
    }

    /// Persists a freshly listed group, replacing any earlier record for the same id.
    ///
    /// Duplicate urls in `state` are dropped, keeping the first occurrence.
    pub fn create_group(&self, state: GroupState) -> Result<GroupState, StoreError> {
        let GroupState {
            group_id,
            group_name,
            token,
            pending_items,
        } = state;
        let mut record = GroupState {
            group_id,
            group_name,
            token,
            pending_items: Vec::new(),
        };
        record.extend_items(pending_items);

        let mut data = self.lock();
        data.groups.insert(record.group_id.clone(), record.clone());
        self.persist(&data)?;
        snap_info!(
            "Created queue for group {} with {} items",
            record.group_id,
            record.pending_items.len()
        );
        Ok(record)
    }

    /// Removes `url` from the group's queue. Absent group or url is a no-op returning `false`.
    pub fn remove_media_item(&self, group_id: &str, url: &str) -> Result<bool, StoreError> {
        let mut data = self.lock();
        let removed = data
            .groups
            .get_mut(group_id)
            .and_then(|group| group.remove_item(url))
            .is_some();
        if removed {
            self.persist(&data)?;
        } else {
            snap_debug!("Queue removal for {} in {} was a no-op", url, group_id);
        }
        Ok(removed)
    }

    /// Drops a whole group record. Only ever invoked on explicit user request.
    pub fn delete_group(&self, group_id: &str) -> Result<bool, StoreError> {
        let mut data = self.lock();
        let removed = data.groups.remove(group_id).is_some();
        if removed {
            self.persist(&data)?;
        }
        Ok(removed)
    }

    pub fn get_token(&self) -> Option<String> {
        self.lock().token.as_ref().map(|record| record.token.clone())
    }

    pub fn set_token(&self, token: &str) -> Result<(), StoreError> {
        let mut data = self.lock();
        data.token = Some(TokenRecord {
            token: token.to_string(),
        });
        self.persist(&data)
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(data, pretty)
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        write_atomically(&self.path, content.as_bytes())
    }
}

/// Ensure the state directory exists and is writable; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| StoreError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(StoreError::StateDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| StoreError::StateDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| StoreError::StateDir(e.to_string()))?;
    Ok(())
}

/// Writes `content` to a temp file next to `target`, then renames it over `target`.
fn write_atomically(target: &Path, content: &[u8]) -> Result<(), StoreError> {
    let dir = target
        .parent()
        .ok_or_else(|| StoreError::StateDir("store path has no parent".into()))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(target).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
