//! Owner-scoped document operations.
//!
//! Every call takes the caller's account id and filters by it. A document that
//! belongs to someone else is indistinguishable from one that does not exist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::DocumentError;
use crate::storage::blob::{ref_belongs_to, BlobStore};
use crate::storage::{extension_for_mime, Document, DocumentType, SharedStore};

/// Metadata for a blob the caller already stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    #[serde(default)]
    pub document_name: String,
    #[serde(default)]
    pub document_type: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub storage_ref: String,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub document_name: String,
    pub document_type: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DocumentAccessor {
    store: SharedStore,
    blobs: Arc<dyn BlobStore>,
    max_upload_bytes: u64,
}

impl std::fmt::Debug for DocumentAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAccessor").field("max_upload_bytes", &self.max_upload_bytes).finish_non_exhaustive()
    }
}

fn check_name(name: &str) -> Result<String, DocumentError> {
    let name = name.trim();
    if name.is_empty() { Err(DocumentError::MissingField("documentName")) } else { Ok(name.to_string()) }
}

fn check_type(t: &str) -> Result<DocumentType, DocumentError> {
    if t.trim().is_empty() {
        return Err(DocumentError::MissingField("documentType"));
    }
    t.parse::<DocumentType>().map_err(DocumentError::InvalidDocumentType)
}

fn check_mime(mime: &str) -> Result<(String, &'static str), DocumentError> {
    let ext = extension_for_mime(mime).ok_or_else(|| DocumentError::UnsupportedFileType(mime.to_string()))?;
    Ok((mime.trim().to_ascii_lowercase(), ext))
}

fn join_failed(e: tokio::task::JoinError) -> DocumentError {
    DocumentError::Blob(std::io::Error::other(e).into())
}

impl DocumentAccessor {
    pub fn new(store: SharedStore, blobs: Arc<dyn BlobStore>, max_upload_bytes: u64) -> Self {
        Self { store, blobs, max_upload_bytes }
    }

    pub fn max_upload_bytes(&self) -> u64 { self.max_upload_bytes }

    pub fn list(&self, owner_id: &str) -> Vec<Document> {
        self.store.documents_for(owner_id)
    }

    pub fn get(&self, owner_id: &str, id: &str) -> Result<Document, DocumentError> {
        self.store.document(owner_id, id).ok_or(DocumentError::NotFound)
    }

    fn record(
        &self,
        owner_id: &str,
        name: String,
        document_type: DocumentType,
        file_type: String,
        file_size: u64,
        storage_ref: String,
        expiry_date: Option<DateTime<Utc>>,
    ) -> Document {
        Document {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            document_name: name,
            document_type,
            file_type,
            file_size,
            storage_ref,
            upload_date: Utc::now(),
            is_verified: false,
            verified_at: None,
            is_encrypted: false,
            expiry_date,
        }
    }

    /// Record metadata for a blob under the caller's own prefix.
    pub fn create(&self, owner_id: &str, meta: NewDocument) -> Result<Document, DocumentError> {
        let name = check_name(&meta.document_name)?;
        let document_type = check_type(&meta.document_type)?;
        let (file_type, _) = check_mime(&meta.file_type)?;
        if meta.file_size == 0 {
            return Err(DocumentError::MissingField("fileSize"));
        }
        if !ref_belongs_to(&meta.storage_ref, owner_id) {
            return Err(DocumentError::ForeignStorageRef);
        }
        let doc = self.record(owner_id, name, document_type, file_type, meta.file_size, meta.storage_ref, meta.expiry_date);
        self.store.insert_document(doc.clone())?;
        info!(owner = %owner_id, document = %doc.id, "document.create");
        Ok(doc)
    }

    pub async fn upload(&self, owner_id: &str, upload: Upload) -> Result<Document, DocumentError> {
        let name = check_name(&upload.document_name)?;
        let document_type = check_type(&upload.document_type)?;
        let (file_type, ext) = check_mime(&upload.mime)?;
        if upload.bytes.is_empty() {
            return Err(DocumentError::EmptyFile);
        }
        let file_size = upload.bytes.len() as u64;
        let blobs = self.blobs.clone();
        let owner = owner_id.to_string();
        let limit = self.max_upload_bytes;
        let bytes = upload.bytes;
        let storage_ref = tokio::task::spawn_blocking(move || blobs.put(&owner, ext, &bytes, limit))
            .await
            .map_err(join_failed)??;

        let doc = self.record(owner_id, name, document_type, file_type, file_size, storage_ref.clone(), upload.expiry_date);
        let store = self.store.clone();
        let record = doc.clone();
        let inserted = tokio::task::spawn_blocking(move || store.insert_document(record)).await.map_err(join_failed)?;
        if let Err(e) = inserted {
            self.remove_blob(storage_ref, "orphaned blob after failed insert").await;
            return Err(e.into());
        }
        info!(owner = %owner_id, document = %doc.id, size = file_size, "document.upload");
        Ok(doc)
    }

    /// Ownership-checked download.
    pub async fn open_file(&self, owner_id: &str, id: &str) -> Result<(Document, Vec<u8>), DocumentError> {
        let doc = self.get(owner_id, id)?;
        let blobs = self.blobs.clone();
        let storage_ref = doc.storage_ref.clone();
        let bytes = tokio::task::spawn_blocking(move || blobs.get(&storage_ref))
            .await
            .map_err(join_failed)??;
        Ok((doc, bytes))
    }

    /// Best-effort blob removal on the blocking pool; failures are logged only.
    async fn remove_blob(&self, storage_ref: String, context: &'static str) {
        let blobs = self.blobs.clone();
        let target = storage_ref.clone();
        match tokio::task::spawn_blocking(move || blobs.delete(&target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%storage_ref, error = %e, "{}", context),
            Err(e) => warn!(%storage_ref, error = %e, "{}", context),
        }
    }

    /// Find-and-delete by owner, then drop the blob.
    pub async fn delete(&self, owner_id: &str, id: &str) -> Result<Document, DocumentError> {
        let store = self.store.clone();
        let (owner, target) = (owner_id.to_string(), id.to_string());
        let doc = tokio::task::spawn_blocking(move || store.delete_document(&owner, &target))
            .await
            .map_err(join_failed)??
            .ok_or(DocumentError::NotFound)?;
        self.remove_blob(doc.storage_ref.clone(), "blob delete failed").await;
        info!(owner = %owner_id, document = %id, "document.delete");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::blob::{BlobError, DiskBlobStore};

    fn accessor(limit: u64) -> (DocumentAccessor, Arc<DiskBlobStore>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let blobs = Arc::new(DiskBlobStore::new(tmp.path()).unwrap());
        (DocumentAccessor::new(SharedStore::in_memory(), blobs.clone(), limit), blobs, tmp)
    }

    fn pdf(name: &str, bytes: &[u8]) -> Upload {
        Upload {
            document_name: name.into(),
            document_type: "passport".into(),
            mime: "application/pdf".into(),
            bytes: bytes.to_vec(),
            expiry_date: None,
        }
    }

    #[tokio::test]
    async fn upload_open_delete() {
        let (docs, blobs, _tmp) = accessor(1024);
        let doc = docs.upload("alice", pdf("Passport", b"%PDF")).await.unwrap();
        assert_eq!(doc.document_type, DocumentType::Passport);
        assert_eq!(doc.file_size, 4);
        assert!(!doc.is_verified && !doc.is_encrypted);
        assert!(doc.storage_ref.starts_with("alice/"));

        let (_, bytes) = docs.open_file("alice", &doc.id).await.unwrap();
        assert_eq!(bytes, b"%PDF");
        assert!(matches!(docs.open_file("bob", &doc.id).await, Err(DocumentError::NotFound)));
        assert!(matches!(docs.delete("bob", &doc.id).await, Err(DocumentError::NotFound)));

        docs.delete("alice", &doc.id).await.unwrap();
        assert!(matches!(blobs.get(&doc.storage_ref), Err(BlobError::NotFound)));
        assert!(docs.list("alice").is_empty());
    }

    #[tokio::test]
    async fn upload_validation() {
        let (docs, _blobs, _tmp) = accessor(8);
        assert!(matches!(docs.upload("a", pdf("", b"x")).await, Err(DocumentError::MissingField(_))));
        let mut bad_type = pdf("n", b"x");
        bad_type.document_type = "Library Card".into();
        assert!(matches!(docs.upload("a", bad_type).await, Err(DocumentError::InvalidDocumentType(_))));
        let mut bad_mime = pdf("n", b"x");
        bad_mime.mime = "text/plain".into();
        assert!(matches!(docs.upload("a", bad_mime).await, Err(DocumentError::UnsupportedFileType(_))));
        assert!(matches!(docs.upload("a", pdf("n", b"")).await, Err(DocumentError::EmptyFile)));
        assert!(matches!(
            docs.upload("a", pdf("n", b"123456789")).await,
            Err(DocumentError::Blob(BlobError::SizeExceeded { limit: 8 }))
        ));
        assert!(docs.list("a").is_empty());
    }

    #[test]
    fn create_requires_own_prefix() {
        let (docs, _blobs, _tmp) = accessor(1024);
        let meta = |r: &str| NewDocument {
            document_name: "PAN card".into(),
            document_type: "PAN".into(),
            file_type: "image/png".into(),
            file_size: 12,
            storage_ref: r.into(),
            expiry_date: None,
        };
        let unsized_meta = NewDocument { file_size: 0, ..meta("alice/x.png") };
        assert!(matches!(docs.create("alice", unsized_meta), Err(DocumentError::MissingField("fileSize"))));
        assert!(docs.list("alice").is_empty());
        assert!(matches!(docs.create("alice", meta("bob/x.png")), Err(DocumentError::ForeignStorageRef)));
        assert!(matches!(docs.create("alice", meta("../x.png")), Err(DocumentError::ForeignStorageRef)));
        let doc = docs.create("alice", meta("alice/x.png")).unwrap();
        assert_eq!(doc.document_type, DocumentType::Pan);
        assert_eq!(docs.get("alice", &doc.id).unwrap(), doc);
        assert!(matches!(docs.get("bob", &doc.id), Err(DocumentError::NotFound)));
    }
}
