// storage/file_storage.rs
//! File-based storage: the whole catalog as one checksummed snapshot
//!
//! ```text
//! EDUHUB1 <crc32 of body, 8 hex digits>\n
//! {"collections": [{"meta": {...}, "documents": [...]}, ...]}
//! ```
//!
//! Snapshots are written to a temp file in the same directory and renamed
//! over the previous one, so a crash never leaves a half-written file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::document::DocumentId;
use crate::error::{EduHubError, Result};
use crate::storage::{Catalog, CollectionMeta, Snapshot, Storage};

const MAGIC: &str = "EDUHUB1";

/// File-based storage backend
pub struct FileStorage {
    path: PathBuf,
    catalog: Catalog,
    dirty: bool,
}

fn encode_snapshot(catalog: &Catalog) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(&catalog.to_snapshot())?;
    let checksum = crc32fast::hash(&body);
    let mut out = format!("{} {:08x}\n", MAGIC, checksum).into_bytes();
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode_snapshot(bytes: &[u8]) -> Result<Catalog> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| EduHubError::Corruption("missing header line".to_string()))?;
    let header = std::str::from_utf8(&bytes[..newline])
        .map_err(|_| EduHubError::Corruption("header is not UTF-8".to_string()))?;
    let body = &bytes[newline + 1..];

    let mut parts = header.split_whitespace();
    if parts.next() != Some(MAGIC) {
        return Err(EduHubError::Corruption("Invalid magic number".to_string()));
    }
    let expected = parts
        .next()
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .ok_or_else(|| EduHubError::Corruption("missing checksum".to_string()))?;
    let actual = crc32fast::hash(body);
    if actual != expected {
        return Err(EduHubError::Corruption(format!(
            "checksum mismatch: expected {:08x}, found {:08x}",
            expected, actual
        )));
    }

    let snapshot: Snapshot = serde_json::from_slice(body)
        .map_err(|e| EduHubError::Corruption(format!("invalid catalog: {}", e)))?;
    Catalog::from_snapshot(snapshot)
}

impl FileStorage {
    /// Open existing database or create new one
    ///
    /// A missing or empty file starts an empty catalog; nothing is written
    /// until the first flush.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let catalog = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => Catalog::new(),
            Ok(bytes) => decode_snapshot(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Catalog::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), collections = catalog.names().len(), "opened database file");

        Ok(FileStorage {
            path,
            catalog,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(&self) -> Result<()> {
        let bytes = encode_snapshot(&self.catalog)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| EduHubError::Io(e.error))?;
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }
}

impl Storage for FileStorage {
    fn write_document(&mut self, collection: &str, id: &DocumentId, doc: &Value) -> Result<u64> {
        let seq = self.catalog.write_document(collection, id, doc.clone())?;
        self.dirty = true;
        Ok(seq)
    }

    fn read_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>> {
        self.catalog.read_document(collection, id)
    }

    fn delete_document(&mut self, collection: &str, id: &DocumentId) -> Result<bool> {
        let removed = self.catalog.delete_document(collection, id)?;
        self.dirty |= removed;
        Ok(removed)
    }

    fn scan_documents(&self, collection: &str) -> Result<Vec<Value>> {
        self.catalog.scan(collection)
    }

    fn document_position(&self, collection: &str, id: &DocumentId) -> Option<u64> {
        self.catalog.position(collection, id)
    }

    fn document_count(&self, collection: &str) -> Result<u64> {
        self.catalog.count(collection)
    }

    fn create_collection(&mut self, meta: CollectionMeta) -> Result<()> {
        self.catalog.create_collection(meta)?;
        self.dirty = true;
        Ok(())
    }

    fn drop_collection(&mut self, name: &str) -> Result<()> {
        self.catalog.drop_collection(name)?;
        self.dirty = true;
        Ok(())
    }

    fn list_collections(&self) -> Vec<String> {
        self.catalog.names()
    }

    fn get_collection_meta(&self, name: &str) -> Option<&CollectionMeta> {
        self.catalog.meta(name)
    }

    fn get_collection_meta_mut(&mut self, name: &str) -> Option<&mut CollectionMeta> {
        // callers only ask for mutable metadata to change it
        self.dirty = true;
        self.catalog.meta_mut(name)
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }
        self.write_snapshot()?;
        self.dirty = false;
        Ok(())
    }
}
