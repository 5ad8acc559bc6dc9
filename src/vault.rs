//!
//! bytevault storage module
//! ------------------------
//! This module implements the on-disk blob store for the vault: a flat
//! directory of named files plus an in-memory index of their metadata. The
//! stored name is derived at upload time as `<marker>-<original name>` where
//! the marker is a monotonically increasing epoch-milliseconds value, so two
//! uploads never collide even when their original names repeat in the same
//! instant.
//!
//! Key responsibilities:
//! - Durable writes via a temp file renamed into place; a blob is only
//!   indexed once it is fully on disk, so a failed or abandoned upload is
//!   never observable through `list`.
//! - Index rebuild from the directory contents at startup, so uploads
//!   survive process restarts.
//! - Delete-by-name that removes blob and index entry as one unit from the
//!   caller's viewpoint; a second delete of the same name fails with
//!   not_found.
//!
//! The public API centers around the `Vault` type, which the server holds in
//! an `Arc` and shares across request handlers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Indexed record of one uploaded blob. Immutable after upload apart from
/// store-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredObject {
    /// Derived, unique stored name: `<marker>-<original name>`.
    pub name: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

pub struct Vault {
    root: PathBuf,
    index: RwLock<BTreeMap<String, StoredObject>>,
    /// Last issued upload-time marker, in epoch milliseconds.
    last_marker: Mutex<i64>,
}

/// Reduce a client-supplied name to its final path component so a crafted
/// name cannot escape the vault root. An empty result falls back to "upload".
fn sanitize_original_name(original: &str) -> String {
    let last = original
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    if last.is_empty() || last == "." || last == ".." {
        "upload".to_string()
    } else {
        last.to_string()
    }
}

impl Vault {
    /// Open a vault rooted at the given directory, creating it if needed and
    /// rebuilding the index from any blobs already present.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create or access vault root: {}", root.display()))?;
        let mut index: BTreeMap<String, StoredObject> = BTreeMap::new();
        let mut last_marker: i64 = 0;
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() { continue; }
            let name = entry.file_name().to_string_lossy().to_string();
            // Skip temp files from interrupted uploads
            if name.starts_with('.') { continue; }
            let meta = entry.metadata()?;
            if let Some((marker_str, _)) = name.split_once('-') {
                if let Ok(marker) = marker_str.parse::<i64>() {
                    last_marker = last_marker.max(marker);
                }
            }
            let created: DateTime<Utc> = meta.created().map(DateTime::from).unwrap_or_else(|_| Utc::now());
            let modified: DateTime<Utc> = meta.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
            index.insert(name.clone(), StoredObject { name, size: meta.len(), created, modified });
        }
        debug!(target: "bytevault::vault", "vault.open root='{}' indexed={} last_marker={}", root.display(), index.len(), last_marker);
        Ok(Self { root, index: RwLock::new(index), last_marker: Mutex::new(last_marker) })
    }

    pub fn root_path(&self) -> &PathBuf { &self.root }

    fn blob_path(&self, name: &str) -> PathBuf { self.root.join(name) }

    /// Issue the next upload-time marker. Markers never repeat and never go
    /// backwards, even across concurrent callers.
    fn next_marker(&self) -> i64 {
        let mut last = self.last_marker.lock();
        let now = Utc::now().timestamp_millis();
        let marker = now.max(*last + 1);
        *last = marker;
        marker
    }

    /// Store a blob under a freshly derived name and index it.
    ///
    /// Once `put` returns Ok, any caller's `list` observes the object; on any
    /// failure no partial blob is left indexed.
    pub fn put(&self, original_name: &str, bytes: &[u8]) -> AppResult<StoredObject> {
        if bytes.is_empty() {
            return Err(AppError::user("empty_upload", "no file content supplied"));
        }
        let marker = self.next_marker();
        let name = format!("{}-{}", marker, sanitize_original_name(original_name));
        let tmp = self.root.join(format!(".{}.part", name));
        let dest = self.blob_path(&name);
        if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, &dest)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        let now = Utc::now();
        let obj = StoredObject { name: name.clone(), size: bytes.len() as u64, created: now, modified: now };
        self.index.write().insert(name.clone(), obj.clone());
        debug!(target: "bytevault::vault", "vault.put name='{}' size={}", name, obj.size);
        Ok(obj)
    }

    /// All currently indexed objects, in stored-name order.
    pub fn list(&self) -> Vec<StoredObject> {
        self.index.read().values().cloned().collect()
    }

    /// Remove a blob and its index entry. Not idempotent: deleting a name
    /// that is not indexed fails with not_found.
    pub fn delete(&self, name: &str) -> AppResult<()> {
        // Hold the write lock across the disk removal so a racing list never
        // sees the object half-gone.
        let mut index = self.index.write();
        if !index.contains_key(name) {
            return Err(AppError::not_found("not_found", "no such object"));
        }
        match fs::remove_file(self.blob_path(name)) {
            Ok(()) => {}
            // Index said it existed; a missing blob means the disk state was
            // already gone, so dropping the entry restores consistency.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        index.remove(name);
        debug!(target: "bytevault::vault", "vault.delete name='{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_original_name("report.txt"), "report.txt");
        assert_eq!(sanitize_original_name("a/b/c.txt"), "c.txt");
        assert_eq!(sanitize_original_name("..\\..\\evil.sh"), "evil.sh");
        assert_eq!(sanitize_original_name("../"), "upload");
        assert_eq!(sanitize_original_name(""), "upload");
        assert_eq!(sanitize_original_name(".."), "upload");
    }

    #[test]
    fn markers_are_strictly_increasing() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = Vault::open(tmp.path()).unwrap();
        let a = vault.next_marker();
        let b = vault.next_marker();
        let c = vault.next_marker();
        assert!(a < b && b < c);
    }

    #[test]
    fn open_rebuilds_index_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let vault = Vault::open(tmp.path()).unwrap();
            vault.put("notes.txt", b"hello").unwrap();
            // A leftover temp file from an interrupted upload is ignored
            std::fs::write(tmp.path().join(".12345-x.part"), b"partial").unwrap();
        }
        let vault = Vault::open(tmp.path()).unwrap();
        let listed = vault.list();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].name.ends_with("-notes.txt"));
        assert_eq!(listed[0].size, 5);
        // Marker continuity: the next put derives a later name
        let next = vault.put("notes.txt", b"again").unwrap();
        assert!(next.name > listed[0].name);
    }
}
