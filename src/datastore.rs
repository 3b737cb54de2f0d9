//! Storage boundary: where fetched-by-uid content comes from and where
//! stored content goes.
//!
//! A [`DataStore`] addresses content by an opaque string uid. The crate
//! ships two implementations:
//!
//! - [`MemoryDataStore`] — a process-local map with counter uids. The
//!   default store, and the one tests lean on.
//! - [`FileDataStore`] — content files plus `.meta.json` sidecars under a
//!   root directory, addressed by relative-path uids.
//!
//! Both keep the object's name and declared MIME type inside the stored
//! metadata, so a later fetch-by-uid can restore them.

use bytes::Bytes;
use mime::Mime;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::temp_object::TempObject;

#[derive(Debug, Error)]
pub enum DataStoreError {
    #[error("no content found for uid: {0}")]
    NotFound(String),
    #[error("invalid uid: {0}")]
    InvalidUid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata error: {0}")]
    Meta(#[from] serde_json::Error),
}

/// Caller-supplied hints for a store operation.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Requested uid. Stores that support it use this verbatim instead of
    /// generating one.
    pub path: Option<String>,
    /// Declared MIME type, recorded in the stored metadata.
    pub mime_type: Option<Mime>,
    /// Extra metadata merged over the object's own.
    pub meta: Map<String, Value>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: Mime) -> Self {
        self.mime_type = Some(mime_type);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Content and metadata handed back by [`DataStore::retrieve`].
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub content: Bytes,
    pub meta: Map<String, Value>,
}

/// Uid-addressed content storage.
pub trait DataStore: Send + Sync {
    /// Persist the object's content, returning the uid it can be fetched
    /// back under.
    fn store(&self, content: &TempObject, options: &StoreOptions)
    -> Result<String, DataStoreError>;

    /// Fetch content and metadata by uid.
    fn retrieve(&self, uid: &str) -> Result<Retrieved, DataStoreError>;

    /// Remove stored content. Unknown uids are an error.
    fn destroy(&self, uid: &str) -> Result<(), DataStoreError>;
}

/// A shared handle is a store too, so several apps can sit on one store
/// and callers can keep a handle after handing the store to a builder.
impl<D: DataStore + ?Sized> DataStore for Arc<D> {
    fn store(
        &self,
        content: &TempObject,
        options: &StoreOptions,
    ) -> Result<String, DataStoreError> {
        (**self).store(content, options)
    }

    fn retrieve(&self, uid: &str) -> Result<Retrieved, DataStoreError> {
        (**self).retrieve(uid)
    }

    fn destroy(&self, uid: &str) -> Result<(), DataStoreError> {
        (**self).destroy(uid)
    }
}

/// Merged metadata written at store time: the object's own meta, its name,
/// the declared MIME type, and the caller's extra meta (which wins).
fn stored_meta(content: &TempObject, options: &StoreOptions) -> Map<String, Value> {
    let mut meta = content.meta.clone();
    if let Some(ref name) = content.name {
        meta.insert("name".to_string(), Value::String(name.clone()));
    }
    if let Some(ref mime_type) = options.mime_type {
        meta.insert("mime_type".to_string(), Value::String(mime_type.to_string()));
    }
    for (key, value) in options.meta.clone() {
        meta.insert(key, value);
    }
    meta
}

// =============================================================================
// MemoryDataStore
// =============================================================================

#[derive(Debug, Clone)]
struct StoredEntry {
    content: Bytes,
    meta: Map<String, Value>,
}

/// Process-local store with counter uids. The default datastore.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
    counter: AtomicU64,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(uid)
    }
}

impl DataStore for MemoryDataStore {
    fn store(
        &self,
        content: &TempObject,
        options: &StoreOptions,
    ) -> Result<String, DataStoreError> {
        let uid = match options.path {
            Some(ref path) => path.clone(),
            None => (self.counter.fetch_add(1, Ordering::Relaxed) + 1).to_string(),
        };
        let entry = StoredEntry {
            content: content.data()?,
            meta: stored_meta(content, options),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uid.clone(), entry);
        Ok(uid)
    }

    fn retrieve(&self, uid: &str) -> Result<Retrieved, DataStoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get(uid)
            .ok_or_else(|| DataStoreError::NotFound(uid.to_string()))?;
        Ok(Retrieved {
            content: entry.content.clone(),
            meta: entry.meta.clone(),
        })
    }

    fn destroy(&self, uid: &str) -> Result<(), DataStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uid)
            .map(|_| ())
            .ok_or_else(|| DataStoreError::NotFound(uid.to_string()))
    }
}

// =============================================================================
// FileDataStore
// =============================================================================

/// Filesystem store: `<root>/<uid>` holds the content, `<root>/<uid>.meta.json`
/// the metadata sidecar. Uids are relative paths; generated ones are a short
/// content digest plus the object's name, so re-storing identical content
/// under the same name is idempotent.
#[derive(Debug, Clone)]
pub struct FileDataStore {
    root: PathBuf,
}

impl FileDataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, uid: &str) -> PathBuf {
        self.root.join(uid)
    }

    fn meta_path(&self, uid: &str) -> PathBuf {
        self.root.join(format!("{uid}.meta.json"))
    }

    fn generate_uid(content: &TempObject, data: &Bytes) -> String {
        let digest = format!("{:x}", Sha256::digest(data));
        let filename = content.name.as_deref().unwrap_or("file");
        format!("{}/{}", &digest[..12], filename)
    }
}

/// Uids are joined onto the store root, so anything that could escape it
/// (absolute paths, `..` segments) is rejected up front.
fn validate_uid(uid: &str) -> Result<(), DataStoreError> {
    if uid.is_empty() || uid.starts_with('/') || uid.split('/').any(|segment| segment == "..") {
        return Err(DataStoreError::InvalidUid(uid.to_string()));
    }
    Ok(())
}

impl DataStore for FileDataStore {
    fn store(
        &self,
        content: &TempObject,
        options: &StoreOptions,
    ) -> Result<String, DataStoreError> {
        let data = content.data()?;
        let uid = match options.path {
            Some(ref path) => path.clone(),
            None => Self::generate_uid(content, &data),
        };
        validate_uid(&uid)?;

        let data_path = self.data_path(&uid);
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&data_path, &data)?;

        let meta = stored_meta(content, options);
        let json = serde_json::to_string_pretty(&Value::Object(meta))?;
        fs::write(self.meta_path(&uid), json)?;

        Ok(uid)
    }

    fn retrieve(&self, uid: &str) -> Result<Retrieved, DataStoreError> {
        validate_uid(uid)?;
        let content = match fs::read(self.data_path(uid)) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DataStoreError::NotFound(uid.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let meta = match fs::read_to_string(self.meta_path(uid)) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Retrieved { content, meta })
    }

    fn destroy(&self, uid: &str) -> Result<(), DataStoreError> {
        validate_uid(uid)?;
        match fs::remove_file(self.data_path(uid)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DataStoreError::NotFound(uid.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        match fs::remove_file(self.meta_path(uid)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
