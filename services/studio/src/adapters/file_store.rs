//! services/studio/src/adapters/file_store.rs
//!
//! A `KeyValueStore` backed by one JSON file per key inside a directory.
//! Every key is namespaced with [`STORAGE_PREFIX`] so the directory can be shared.

use async_trait::async_trait;
use lesson_pipeline_core::ports::{KeyValueStore, PortError, PortResult};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Namespace prepended to every stored key.
pub const STORAGE_PREFIX: &str = "edugenai_";

const FILE_EXTENSION: &str = "json";

#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", STORAGE_PREFIX, encode_key(key), FILE_EXTENSION))
    }
}

/// Keeps keys filesystem-safe: everything outside `[A-Za-z0-9._~-]` is percent-encoded.
fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

fn decode_key(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|key| key.into_owned())
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> PortError {
    PortError::Storage(format!(
        "Failed to {} {}: {}",
        action,
        path.display(),
        err
    ))
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create", &self.dir, e))?;
        let path = self.path_for(key);
        // Each write stages into its own temporary file; readers only ever see a
        // complete one.
        let dir = self.dir.clone();
        let target = path.clone();
        let contents = value.to_string();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut staging = tempfile::NamedTempFile::new_in(&dir)?;
            staging.write_all(contents.as_bytes())?;
            staging.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| PortError::Storage(format!("Storage task failed: {}", e)))?
        .map_err(|e| io_error("write", &path, e))?;
        debug!(path = %path.display(), bytes = value.len(), "Stored entry");
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &path, e)),
        }
    }

    async fn keys(&self) -> PortResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list", &self.dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list", &self.dir, e))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let key = name
                .strip_prefix(STORAGE_PREFIX)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(decode_key);
            if let Some(key) = key {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
