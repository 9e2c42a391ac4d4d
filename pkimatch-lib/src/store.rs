//! The logical store collaborator: documents readable and listable by path.
//!
//! [`LogicalStore`] is the seam to whatever backs the PKI mounts (a remote
//! secrets engine, a snapshot on disk, a test fixture). [`MemoryStore`] is
//! the in-process implementation used by the CLI snapshot mode and tests.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Errors surfaced by a [`LogicalStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only access to a path-addressed document store.
///
/// Both operations return `Ok(None)` when nothing exists at `path`. Paths
/// are passed without leading or trailing slashes.
pub trait LogicalStore {
    /// Read the document stored at `path`.
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// List the children of `path`. The document carries a `keys` array.
    fn list(&self, path: &str) -> Result<Option<Value>, StoreError>;
}

impl<T: LogicalStore + ?Sized> LogicalStore for &T {
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        (**self).read(path)
    }

    fn list(&self, path: &str) -> Result<Option<Value>, StoreError> {
        (**self).list(path)
    }
}

/// Largest snapshot file [`MemoryStore::from_file`] will load.
pub const MAX_SNAPSHOT_BYTES: u64 = 64 * 1024 * 1024;

fn read_snapshot(path: &Path, max_bytes: u64) -> Result<Vec<u8>, StoreError> {
    let with_path = |e: std::io::Error| {
        StoreError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    };
    let meta = std::fs::metadata(path).map_err(with_path)?;
    if meta.len() > max_bytes {
        return Err(StoreError::InvalidSnapshot(format!(
            "file too large ({} bytes, max {} bytes): {}",
            meta.len(),
            max_bytes,
            path.display()
        )));
    }
    std::fs::read(path).map_err(with_path)
}

/// On-disk snapshot layout accepted by [`MemoryStore::from_json_slice`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Snapshot {
    #[serde(default)]
    documents: BTreeMap<String, Value>,
    #[serde(default)]
    lists: BTreeMap<String, Value>,
}

/// An in-memory [`LogicalStore`].
///
/// Keys are normalized on insert and lookup, so `pki/issuers/` and
/// `pki/issuers` address the same entry.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: BTreeMap<String, Value>,
    lists: BTreeMap<String, Value>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot of the form
    /// `{"documents": {path: doc, ...}, "lists": {path: doc, ...}}`.
    pub fn from_json_slice(data: &[u8]) -> Result<Self, StoreError> {
        let snapshot: Snapshot = serde_json::from_slice(data)?;
        let mut store = MemoryStore::new();
        for (path, doc) in snapshot.documents {
            if !doc.is_object() {
                return Err(StoreError::InvalidSnapshot(format!(
                    "document at {} is not an object",
                    path
                )));
            }
            store.insert_document(&path, doc);
        }
        for (path, doc) in snapshot.lists {
            // Bare arrays are shorthand for {"keys": [...]}.
            let doc = match doc {
                Value::Array(keys) => serde_json::json!({ "keys": keys }),
                Value::Object(_) => doc,
                _ => {
                    return Err(StoreError::InvalidSnapshot(format!(
                        "list at {} is neither an object nor an array",
                        path
                    )))
                }
            };
            store.lists.insert(normalize(&path), doc);
        }
        Ok(store)
    }

    /// Load a snapshot file of at most [`MAX_SNAPSHOT_BYTES`].
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        Self::from_json_slice(&read_snapshot(path, MAX_SNAPSHOT_BYTES)?)
    }

    /// Store `doc` at `path`, replacing any previous document.
    pub fn insert_document(&mut self, path: &str, doc: Value) {
        self.documents.insert(normalize(path), doc);
    }

    /// Register the listing of `path` as the given keys.
    pub fn insert_list<I, S>(&mut self, path: &str, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<Value> = keys.into_iter().map(|k| Value::String(k.into())).collect();
        self.lists
            .insert(normalize(path), serde_json::json!({ "keys": keys }));
    }

    /// Number of readable documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl LogicalStore for MemoryStore {
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.documents.get(normalize(path).as_str()).cloned())
    }

    fn list(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lists.get(normalize(path).as_str()).cloned())
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}
