//! Blob storage for uploaded files.
//!
//! Refs look like `<owner>/<uuid>.<ext>` and are always resolved inside the blob
//! root; anything with other shapes is refused before touching the filesystem.

use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("File size exceeds the {limit} byte limit")]
    SizeExceeded { limit: u64 },
    #[error("blob not found")]
    NotFound,
    #[error("invalid storage reference: {0}")]
    InvalidRef(String),
    #[error("blob io: {0}")]
    Io(#[from] std::io::Error),
}

pub trait BlobStore: Send + Sync {
    /// Store `bytes` for `owner`, refusing payloads larger than `size_limit`.
    fn put(&self, owner: &str, extension: &str, bytes: &[u8], size_limit: u64) -> Result<String, BlobError>;
    fn get(&self, storage_ref: &str) -> Result<Vec<u8>, BlobError>;
    fn delete(&self, storage_ref: &str) -> Result<(), BlobError>;
}

fn is_safe_segment(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn sanitize_extension(ext: &str) -> String {
    let clean: String = ext
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if clean.is_empty() { "bin".to_string() } else { clean }
}

/// True when `storage_ref` is a well-formed ref inside `owner`'s namespace.
pub fn ref_belongs_to(storage_ref: &str, owner: &str) -> bool {
    match storage_ref.split_once('/') {
        Some((o, file)) => o == owner && is_safe_segment(o) && is_safe_segment(file) && !file.contains('/'),
        None => false,
    }
}

/// Files on local disk under a single root folder.
#[derive(Debug, Clone)]
pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, BlobError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, storage_ref: &str) -> Result<PathBuf, BlobError> {
        let Some((owner, file)) = storage_ref.split_once('/') else {
            return Err(BlobError::InvalidRef(storage_ref.to_string()));
        };
        if !is_safe_segment(owner) || !is_safe_segment(file) || file.contains('/') {
            return Err(BlobError::InvalidRef(storage_ref.to_string()));
        }
        Ok(self.root.join(owner).join(file))
    }
}

impl BlobStore for DiskBlobStore {
    fn put(&self, owner: &str, extension: &str, bytes: &[u8], size_limit: u64) -> Result<String, BlobError> {
        if bytes.len() as u64 > size_limit {
            return Err(BlobError::SizeExceeded { limit: size_limit });
        }
        if !is_safe_segment(owner) {
            return Err(BlobError::InvalidRef(owner.to_string()));
        }
        let storage_ref = format!("{}/{}.{}", owner, uuid::Uuid::new_v4(), sanitize_extension(extension));
        let path = self.resolve(&storage_ref)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("part");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        debug!(storage_ref = %storage_ref, size = bytes.len(), "blob.put");
        Ok(storage_ref)
    }

    fn get(&self, storage_ref: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.resolve(storage_ref)?;
        match std::fs::read(&path) {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, storage_ref: &str) -> Result<(), BlobError> {
        let path = self.resolve(storage_ref)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(storage_ref = %storage_ref, "blob.delete");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let blobs = DiskBlobStore::new(tmp.path()).unwrap();
        let r = blobs.put("owner-1", "PDF", b"%PDF-1.4 hello", 1024).unwrap();
        assert!(r.starts_with("owner-1/"));
        assert!(r.ends_with(".pdf"));
        assert!(ref_belongs_to(&r, "owner-1"));
        assert!(!ref_belongs_to(&r, "owner-2"));
        assert_eq!(blobs.get(&r).unwrap(), b"%PDF-1.4 hello");
        blobs.delete(&r).unwrap();
        assert!(matches!(blobs.get(&r), Err(BlobError::NotFound)));
        assert!(matches!(blobs.delete(&r), Err(BlobError::NotFound)));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let tmp = tempfile::tempdir().unwrap();
        let blobs = DiskBlobStore::new(tmp.path()).unwrap();
        assert!(blobs.put("o", "png", &[0u8; 16], 16).is_ok());
        assert!(matches!(blobs.put("o", "png", &[0u8; 17], 16), Err(BlobError::SizeExceeded { limit: 16 })));
    }

    #[test]
    fn refuses_escaping_refs() {
        let tmp = tempfile::tempdir().unwrap();
        let blobs = DiskBlobStore::new(tmp.path()).unwrap();
        for bad in ["../etc/passwd", "o/../../x", "noslash", "/abs/path", "o/.hidden", "o/a/b"] {
            assert!(matches!(blobs.get(bad), Err(BlobError::InvalidRef(_))), "accepted {bad}");
            assert!(!ref_belongs_to(bad, "o"));
        }
    }
}
