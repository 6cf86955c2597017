use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    serde_json::Value,
    tracing::{debug, info, warn},
};

use crate::{KeyValueStore, Result, StoredEntry, now_unix};

type EntryMap = BTreeMap<String, StoredEntry>;

/// File-backed store: one JSON object mapping keys to entries.
///
/// Writers inside one process are serialized; separate processes sharing the
/// file are last-writer-wins.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> EntryMap {
        let path = self.path.display().to_string();
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path, "store file not found");
                return EntryMap::new();
            },
            Err(e) => {
                warn!(path = %path, error = %e, "store file read failed");
                return EntryMap::new();
            },
        };

        match serde_json::from_str(&data) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path, error = %e, "store file parse failed, treating as empty");
                EntryMap::new()
            },
        }
    }

    fn write_map(&self, map: &EntryMap) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, &data)?;

        // Entries hold access tokens.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut EntryMap)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map();
        let now = now_unix();
        map.retain(|_, entry| !entry.is_expired_at(now));
        f(&mut map);
        self.write_map(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let map = self.read_map();
        match map.get(key) {
            Some(entry) if entry.is_expired_at(now_unix()) => {
                debug!(key, "stored entry expired");
                Ok(None)
            },
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value, expires_at: Option<u64>) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), StoredEntry { value, expires_at });
        })?;
        debug!(path = %self.path.display(), key, "stored entry written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|map| {
            map.remove(key);
        })
    }

    fn clear_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        info!(path = %self.path.display(), "clearing store");
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let now = now_unix();
        Ok(self
            .read_map()
            .into_iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key)
            .collect())
    }
}
