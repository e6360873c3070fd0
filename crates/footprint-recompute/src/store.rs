//! Workbook byte storage.
//!
//! Documents are opaque byte blobs behind opaque string identifiers. Legacy
//! identifiers sometimes arrive in a `prefix:realId` shape; every store
//! resolves keys through [`storage_key`] so both spellings reach the same
//! document.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use footprint_fs::atomic_write_bytes;

/// File extension used by on-disk workbook stores.
pub const FWB_EXTENSION: &str = "fwb";

/// Byte-blob storage for encoded workbooks.
pub trait WorkbookStore {
    fn read(&self, id: &str) -> io::Result<Vec<u8>>;
    fn write(&self, id: &str, bytes: &[u8]) -> io::Result<()>;
    /// Duplicate a document under a freshly generated identifier and return
    /// that identifier.
    fn copy(&self, id: &str) -> io::Result<String>;
    fn delete(&self, id: &str) -> io::Result<()>;
}

/// Strip the legacy `prefix:` qualifier from an identifier, if present.
pub fn storage_key(id: &str) -> &str {
    match id.split_once(':') {
        Some((_, suffix)) => suffix,
        None => id,
    }
}

fn not_found(id: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no workbook {id:?}"))
}

/// Store keeping each workbook as `<root>/<key>.fwb`.
///
/// Writes go through [`footprint_fs::atomic_write_bytes`], so a reader
/// observes either the previous document or the new one, never a torn file.
#[derive(Clone, Debug)]
pub struct FsWorkbookStore {
    root: PathBuf,
}

impl FsWorkbookStore {
    /// Wrap an existing directory without touching the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the backing directory if needed and wrap it.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let store = Self::new(root);
        std::fs::create_dir_all(&store.root)?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of a document.
    pub fn path_for(&self, id: &str) -> PathBuf {
        let mut path = self.root.join(storage_key(id));
        path.set_extension(FWB_EXTENSION);
        path
    }
}

impl WorkbookStore for FsWorkbookStore {
    fn read(&self, id: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_for(id))
    }

    fn write(&self, id: &str, bytes: &[u8]) -> io::Result<()> {
        atomic_write_bytes(self.path_for(id), bytes)
    }

    fn copy(&self, id: &str) -> io::Result<String> {
        let bytes = self.read(id)?;
        let new_id = Uuid::new_v4().to_string();
        self.write(&new_id, &bytes)?;
        Ok(new_id)
    }

    fn delete(&self, id: &str) -> io::Result<()> {
        std::fs::remove_file(self.path_for(id))
    }
}

/// In-memory store for tests and ephemeral callers.
#[derive(Debug, Default)]
pub struct MemoryWorkbookStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryWorkbookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held.
    pub fn len(&self) -> usize {
        self.blobs.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkbookStore for MemoryWorkbookStore {
    fn read(&self, id: &str) -> io::Result<Vec<u8>> {
        let blobs = self.blobs.lock().expect("store mutex poisoned");
        blobs
            .get(storage_key(id))
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    fn write(&self, id: &str, bytes: &[u8]) -> io::Result<()> {
        let mut blobs = self.blobs.lock().expect("store mutex poisoned");
        blobs.insert(storage_key(id).to_string(), bytes.to_vec());
        Ok(())
    }

    fn copy(&self, id: &str) -> io::Result<String> {
        let mut blobs = self.blobs.lock().expect("store mutex poisoned");
        let bytes = blobs
            .get(storage_key(id))
            .cloned()
            .ok_or_else(|| not_found(id))?;
        let new_id = Uuid::new_v4().to_string();
        blobs.insert(new_id.clone(), bytes);
        Ok(new_id)
    }

    fn delete(&self, id: &str) -> io::Result<()> {
        let mut blobs = self.blobs.lock().expect("store mutex poisoned");
        match blobs.remove(storage_key(id)) {
            Some(_) => Ok(()),
            None => Err(not_found(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_ids_alias_the_suffix() {
        assert_eq!(storage_key("abc"), "abc");
        assert_eq!(storage_key("legacy:abc"), "abc");
        assert_eq!(storage_key("a:b:c"), "b:c");

        let store = MemoryWorkbookStore::new();
        store.write("legacy:doc", b"v1").unwrap();
        assert_eq!(store.read("doc").unwrap(), b"v1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryWorkbookStore::new();
        assert!(store.read("missing").is_err());

        store.write("doc", b"bytes").unwrap();
        assert_eq!(store.read("doc").unwrap(), b"bytes");

        let copy_id = store.copy("doc").unwrap();
        assert_ne!(copy_id, "doc");
        assert_eq!(store.read(&copy_id).unwrap(), b"bytes");

        store.delete("doc").unwrap();
        assert!(store.read("doc").is_err());
        assert_eq!(store.read(&copy_id).unwrap(), b"bytes");
    }

    #[test]
    fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsWorkbookStore::open(dir.path().join("books")).unwrap();

        store.write("doc", b"contents").unwrap();
        assert_eq!(store.read("doc").unwrap(), b"contents");
        assert!(store.path_for("doc").ends_with("doc.fwb"));
        assert_eq!(store.path_for("legacy:doc"), store.path_for("doc"));

        let copy_id = store.copy("doc").unwrap();
        assert_eq!(store.read(&copy_id).unwrap(), b"contents");

        store.delete("doc").unwrap();
        assert!(store.read("doc").is_err());
    }

    #[test]
    fn fs_store_overwrites_are_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsWorkbookStore::open(dir.path()).unwrap();

        store.write("doc", &vec![0xAA; 4096]).unwrap();
        store.write("doc", b"short").unwrap();
        assert_eq!(store.read("doc").unwrap(), b"short");
    }
}
