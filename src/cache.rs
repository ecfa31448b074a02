use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Key/value blob storage shared by consolidation and translation.
///
/// Keys are namespaced (`ocr:…`, `tr:…`) and derived from content hashes, so
/// two writers racing on one key always write the same value.
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, blob: &[u8]) -> Result<()>;
}

/// Stable hex digest of `bytes`.
pub fn key_hash(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|ch| match ch {
                ':' | '/' | '\\' => '_',
                other => other,
            })
            .collect();
        self.dir.join(file_name)
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!("cache: unreadable entry {}: {}", path.display(), err);
                }
                None
            }
        }
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let mut file = tempfile::Builder::new()
            .prefix(".blob-")
            .tempfile_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {}", self.dir.display()))?;
        file.write_all(blob)
            .with_context(|| "failed to write cache blob")?;
        file.persist(&path)
            .with_context(|| format!("failed to persist cache blob: {}", path.display()))?;
        Ok(())
    }
}

/// Process-local store, mostly for tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory cache lock poisoned"))?;
        entries.insert(key.to_string(), blob.to_vec());
        Ok(())
    }
}
