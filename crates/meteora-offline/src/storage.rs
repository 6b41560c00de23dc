//! Named cache partitions keyed by request URL.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use meteora_core::OfflineConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::OfflineError;
use crate::fetch::Response;

type Partition = BTreeMap<String, Response>;

/// The three partition names for one version tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub static_assets: String,
    pub data: String,
    pub general: String,
}

impl CacheNames {
    pub fn new(prefix: &str, version: &str) -> Self {
        Self {
            static_assets: format!("{}-static-{}", prefix, version),
            data: format!("{}-data-{}", prefix, version),
            general: format!("{}-{}", prefix, version),
        }
    }

    pub fn from_config(config: &OfflineConfig) -> Self {
        Self::new(&config.cache_prefix, &config.version)
    }

    pub fn all(&self) -> [&str; 3] {
        [
            self.static_assets.as_str(),
            self.data.as_str(),
            self.general.as_str(),
        ]
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.all().contains(&name)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// Creation order is preserved; lookups across partitions follow it
    partitions: Vec<(String, Partition)>,
}

/// Shared, thread-safe set of partitions. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    inner: Arc<RwLock<Snapshot>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the partition if it does not exist
    pub fn open(&self, name: &str) {
        let mut inner = self.inner.write();
        if !inner.partitions.iter().any(|(n, _)| n == name) {
            inner.partitions.push((name.to_string(), Partition::new()));
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.read().partitions.iter().any(|(n, _)| n == name)
    }

    /// Partition names in creation order
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .read()
            .partitions
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn delete(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        let before = inner.partitions.len();
        inner.partitions.retain(|(n, _)| n != name);
        inner.partitions.len() != before
    }

    /// Store `response` under `url`, creating the partition as needed
    pub fn put(&self, name: &str, url: &str, response: Response) {
        self.put_all(name, vec![(url.to_string(), response)]);
    }

    /// Store every entry in one step; readers never see a partial batch
    pub fn put_all(&self, name: &str, entries: Vec<(String, Response)>) {
        let mut inner = self.inner.write();
        let index = match inner.partitions.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                inner.partitions.push((name.to_string(), Partition::new()));
                inner.partitions.len() - 1
            }
        };
        inner.partitions[index].1.extend(entries);
    }

    pub fn get(&self, name: &str, url: &str) -> Option<Response> {
        self.inner
            .read()
            .partitions
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, p)| p.get(url).cloned())
    }

    /// First match across all partitions, in creation order
    pub fn match_any(&self, url: &str) -> Option<Response> {
        self.inner
            .read()
            .partitions
            .iter()
            .find_map(|(_, p)| p.get(url).cloned())
    }

    pub fn remove(&self, name: &str, url: &str) -> bool {
        self.inner
            .write()
            .partitions
            .iter_mut()
            .find(|(n, _)| n == name)
            .is_some_and(|(_, p)| p.remove(url).is_some())
    }

    /// URLs stored in a partition
    pub fn urls(&self, name: &str) -> Vec<String> {
        self.inner
            .read()
            .partitions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entries(&self, name: &str) -> Vec<(String, Response)> {
        self.inner
            .read()
            .partitions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Write every partition to `path` as JSON
    pub fn save_to(&self, path: &Path) -> Result<(), OfflineError> {
        let json = {
            let inner = self.inner.read();
            serde_json::to_vec(&*inner).map_err(OfflineError::Snapshot)?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!("Saved cache snapshot to {}", path.display());
        Ok(())
    }

    /// Load a snapshot written by [`CacheStorage::save_to`]; a missing file
    /// yields empty storage.
    pub fn load_from(path: &Path) -> Result<Self, OfflineError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(OfflineError::Snapshot)?;

        tracing::debug!(
            "Restored {} cache partitions from {}",
            snapshot.partitions.len(),
            path.display()
        );
        Ok(Self {
            inner: Arc::new(RwLock::new(snapshot)),
        })
    }
}
