//! File-backed storage: one JSON document per key, plus a small pointer file.

use fusion_tracker_core::{KeyValueStore, PointerStore};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> StorageError + '_ {
    move |source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    }
}

/// Keys become file names: anything outside `[A-Za-z0-9._-]` is percent-encoded.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let hex = name.get(index + 1..index + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

/// Bulk store over a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(io_error(&root))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{RECORD_EXTENSION}", encode_key(key)))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for JsonDirStore {
    type Error = StorageError;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        let path = self.path_for(key);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&path)(err)),
        };
        serde_json::from_str(&text).map(Some).map_err(json_error(&path))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), Self::Error> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec_pretty(value).map_err(json_error(&path))?;
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(io_error(&staging))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(io_error(&path))
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, Self::Error> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(io_error(&self.root))?;
        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(io_error(&self.root))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_key)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Pointer store kept in one small JSON object file.
#[derive(Debug, Clone)]
pub struct FilePointer {
    path: PathBuf,
}

impl FilePointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(json_error(&self.path)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(io_error(&self.path)(err)),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(entries).map_err(json_error(&self.path))?;
        std::fs::write(&self.path, text).map_err(io_error(&self.path))
    }
}

impl PointerStore for FilePointer {
    type Error = StorageError;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.read_all()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn clear(&self, key: &str) -> Result<(), Self::Error> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}
