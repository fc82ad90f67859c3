//! Snapshot repository — the tracked snapshot file on local disk.
//!
//! ## `write` protocol
//!
//! 1. Encode the snapshot (deterministic bytes).
//! 2. SHA-256 the encoded bytes.
//! 3. Compare with the digest of the current file → skip if identical.
//! 4. Write to `<file>.picking.tmp`.
//! 5. Rename to the final path (atomic on POSIX).
//!
//! Concurrent readers therefore see either the old or the new document,
//! never a partial one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use picking_core::codec;
use picking_core::Snapshot;

use crate::error::{io_err, StoreError};

/// Outcome of [`SnapshotRepository::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was left alone; encoded content matches what is on disk.
    Unchanged { path: PathBuf },
}

/// Owns the lifecycle of one snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    path: PathBuf,
}

impl SnapshotRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Raw bytes of the current file, `None` if it does not exist yet.
    pub fn read_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&self.path, err)),
        }
    }

    /// Decode the current file. A missing file is an empty snapshot.
    pub fn read(&self) -> Result<Snapshot, StoreError> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(Snapshot::new());
        };
        codec::decode(&bytes).map_err(|source| StoreError::BackupRead {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the file's contents with `snapshot`.
    pub fn write(&self, snapshot: &Snapshot) -> Result<WriteResult, StoreError> {
        let tmp = PathBuf::from(format!("{}.picking.tmp", self.path.display()));
        self.write_with_tmp(snapshot, &tmp)
    }

    fn write_with_tmp(&self, snapshot: &Snapshot, tmp: &Path) -> Result<WriteResult, StoreError> {
        let encoded = codec::encode(snapshot).map_err(StoreError::Encode)?;

        let new_digest = digest(&encoded);
        if let Some(existing) = self.read_bytes()? {
            if digest(&existing) == new_digest {
                tracing::debug!(path = %self.path.display(), "snapshot unchanged");
                return Ok(WriteResult::Unchanged {
                    path: self.path.clone(),
                });
            }
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::write(tmp, &encoded).map_err(|e| io_err(tmp, e))?;

        if let Err(e) = std::fs::rename(tmp, &self.path) {
            let _ = std::fs::remove_file(tmp);
            return Err(io_err(&self.path, e));
        }

        tracing::info!(
            path = %self.path.display(),
            records = snapshot.len(),
            digest = %&new_digest[..12],
            "wrote snapshot",
        );
        Ok(WriteResult::Written {
            path: self.path.clone(),
        })
    }
}

/// Hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use picking_core::{Record, Status};
    use tempfile::TempDir;

    fn one_record(status: Status) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("ORD-1", Record::with_status(status));
        snapshot
    }

    #[test]
    fn missing_file_reads_as_empty_snapshot() {
        let tmp = TempDir::new().unwrap();
        let repo = SnapshotRepository::new(tmp.path().join("backup.json"));
        assert!(!repo.exists());
        assert!(repo.read().unwrap().is_empty());
    }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let repo = SnapshotRepository::new(tmp.path().join("backup.json"));
        let snapshot = one_record(Status::Printed);

        let result = repo.write(&snapshot).unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(repo.read().unwrap(), snapshot);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let repo = SnapshotRepository::new(tmp.path().join("data").join("nested").join("b.json"));
        repo.write(&one_record(Status::Shipped)).unwrap();
        assert!(repo.exists());
    }

    #[test]
    fn identical_content_is_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let repo = SnapshotRepository::new(tmp.path().join("backup.json"));
        let snapshot = one_record(Status::Received);

        repo.write(&snapshot).unwrap();
        let second = repo.write(&snapshot).unwrap();
        assert!(matches!(second, WriteResult::Unchanged { .. }));

        let third = repo.write(&one_record(Status::Printed)).unwrap();
        assert!(matches!(third, WriteResult::Written { .. }));
    }

    #[test]
    fn tmp_file_cleaned_up_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("backup.json");
        let repo = SnapshotRepository::new(&path);
        repo.write(&one_record(Status::Printed)).unwrap();
        let tmp_path = PathBuf::from(format!("{}.picking.tmp", path.display()));
        assert!(!tmp_path.exists(), "tmp file should be renamed away");
    }

    #[test]
    fn malformed_file_is_a_backup_read_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("backup.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let err = SnapshotRepository::new(&path).read().unwrap_err();
        match err {
            StoreError::BackupRead { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected BackupRead, got {other:?}"),
        }
    }

    #[test]
    fn directory_in_place_of_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("occupied");
        std::fs::create_dir_all(target.join("child")).unwrap();
        let repo = SnapshotRepository::new(&target);

        let err = repo.write(&one_record(Status::Printed)).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!tmp.path().join("occupied.picking.tmp").exists());
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
