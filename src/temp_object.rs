//! Content holder passed between pipeline steps.
//!
//! A [`TempObject`] owns one piece of binary content plus its name and
//! metadata. Content is immutable once set: a step that changes content
//! produces a fresh object, and the job keeps the superseded one around
//! until [`Job::close`](crate::job::Job::close) reclaims it.
//!
//! Reads are lazy in both directions:
//!
//! - a file-backed object reads its file on first [`data`](TempObject::data)
//!   and caches the bytes;
//! - an in-memory object spools to a temp file on first
//!   [`path`](TempObject::path), for collaborators that need a real file.
//!
//! Clones share the cheap byte payload but never a spool file, so a forked
//! job can never delete a file out from under its sibling.

use bytes::Bytes;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
enum Source {
    Memory(Bytes),
    File(PathBuf),
}

/// One piece of content with its name and metadata.
#[derive(Debug)]
pub struct TempObject {
    source: Source,
    /// Cached bytes of a file-backed source. Filled on first read.
    cached: OnceCell<Bytes>,
    /// Temp file holding spooled in-memory content. Deleted on close or drop.
    spool: Option<NamedTempFile>,
    pub name: Option<String>,
    pub meta: Map<String, Value>,
}

impl TempObject {
    /// Content held directly in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            source: Source::Memory(data.into()),
            cached: OnceCell::new(),
            spool: None,
            name: None,
            meta: Map::new(),
        }
    }

    /// Content backed by a file on disk. The file is not touched until the
    /// first read, so a missing file surfaces as an error from [`data`]
    /// rather than from construction.
    ///
    /// [`data`]: Self::data
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::File(path.into()),
            cached: OnceCell::new(),
            spool: None,
            name: None,
            meta: Map::new(),
        }
    }

    /// The content bytes. File-backed sources are read once and cached;
    /// the returned handle is a cheap reference-counted view.
    pub fn data(&self) -> io::Result<Bytes> {
        match self.source {
            Source::Memory(ref data) => Ok(data.clone()),
            Source::File(ref path) => self
                .cached
                .get_or_try_init(|| fs::read(path).map(Bytes::from))
                .cloned(),
        }
    }

    /// Content size in bytes. Uses file metadata when the content hasn't
    /// been read yet, so sizing a large file-backed object stays cheap.
    pub fn size(&self) -> io::Result<u64> {
        match self.source {
            Source::Memory(ref data) => Ok(data.len() as u64),
            Source::File(ref path) => match self.cached.get() {
                Some(data) => Ok(data.len() as u64),
                None => Ok(fs::metadata(path)?.len()),
            },
        }
    }

    /// A filesystem path holding the content, for collaborators that work
    /// on files. File-backed sources return their original path; in-memory
    /// content is spooled once to a temp file owned by this object.
    pub fn path(&mut self) -> io::Result<&Path> {
        match self.source {
            Source::File(ref path) => Ok(path),
            Source::Memory(ref data) => {
                if self.spool.is_none() {
                    let mut spool = NamedTempFile::new()?;
                    spool.write_all(data)?;
                    self.spool = Some(spool);
                }
                match self.spool {
                    Some(ref spool) => Ok(spool.path()),
                    None => Err(io::Error::other("spool file missing after creation")),
                }
            }
        }
    }

    /// Whether the content lives in memory (as opposed to a source file).
    pub fn in_memory(&self) -> bool {
        matches!(self.source, Source::Memory(_))
    }

    /// Release the spool file, if any. Idempotent. Never touches a
    /// caller-supplied source file. Dropping the object would reclaim the
    /// spool too; close makes the point of cleanup explicit.
    pub fn close(&mut self) {
        self.spool = None;
    }
}

impl Clone for TempObject {
    /// Clones share the byte payload and read cache but never the spool
    /// file; the clone re-spools on demand.
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            cached: self.cached.clone(),
            spool: None,
            name: self.name.clone(),
            meta: self.meta.clone(),
        }
    }
}
