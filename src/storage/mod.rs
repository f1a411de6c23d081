//!
//! digicard storage module
//! ------------------------
//! Account and document metadata live in memory behind a single `RwLock` and are
//! persisted as one JSON snapshot (`<root>/store.json`) rewritten after every
//! mutation (write to a temp file, then rename). Blobs are kept separately by the
//! `blob` submodule.
//!
//! Every mutation is a single-record atomic step: unique insert, find-and-update,
//! or find-and-delete. If the snapshot cannot be written the in-memory change is
//! rolled back so memory and disk never disagree.

use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod blob;
mod records;

pub use records::{extension_for_mime, Account, Document, DocumentType, StoredAccount, ALLOWED_FILE_TYPES};

const SNAPSHOT_FILE: &str = "store.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,
    #[error("card number already assigned")]
    CardNumberTaken,
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    version: u32,
    accounts: Vec<StoredAccount>,
    documents: Vec<Document>,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, StoredAccount>,
    /// normalized email -> account id
    by_email: HashMap<String, String>,
    /// card number -> account id
    by_card: HashMap<String, String>,
    documents: HashMap<String, Document>,
}

impl Tables {
    fn from_snapshot(snap: Snapshot) -> Self {
        let mut t = Tables::default();
        for acc in snap.accounts {
            t.index_account(&acc);
            t.accounts.insert(acc.account.id.clone(), acc);
        }
        for doc in snap.documents {
            t.documents.insert(doc.id.clone(), doc);
        }
        t
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut accounts: Vec<StoredAccount> = self.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.account.created_at.cmp(&b.account.created_at));
        let mut documents: Vec<Document> = self.documents.values().cloned().collect();
        documents.sort_by(|a, b| a.upload_date.cmp(&b.upload_date));
        Snapshot { version: 1, accounts, documents }
    }

    fn index_account(&mut self, acc: &StoredAccount) {
        self.by_email.insert(acc.account.email.clone(), acc.account.id.clone());
        self.by_card.insert(acc.account.card_number.clone(), acc.account.id.clone());
    }

    fn unindex_account(&mut self, acc: &StoredAccount) {
        self.by_email.remove(&acc.account.email);
        self.by_card.remove(&acc.account.card_number);
    }
}

/// Metadata store for accounts and documents.
pub struct Store {
    /// Snapshot folder; `None` keeps everything in memory.
    root: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl Store {
    /// Open (or create) a store rooted at the given folder, loading any existing snapshot.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let snap_path = root.join(SNAPSHOT_FILE);
        let tables = if snap_path.exists() {
            let bytes = std::fs::read(&snap_path)?;
            let snap: Snapshot = serde_json::from_slice(&bytes)?;
            Tables::from_snapshot(snap)
        } else {
            Tables::default()
        };
        debug!(root = %root.display(), accounts = tables.accounts.len(), documents = tables.documents.len(), "store.open");
        Ok(Self { root: Some(root), tables: RwLock::new(tables) })
    }

    pub fn in_memory() -> Self {
        Self { root: None, tables: RwLock::new(Tables::default()) }
    }

    fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
        let Some(root) = &self.root else { return Ok(()); };
        let bytes = serde_json::to_vec_pretty(&tables.to_snapshot())?;
        let path = root.join(SNAPSHOT_FILE);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    pub fn account_count(&self) -> usize { self.tables.read().accounts.len() }

    pub fn document_count(&self) -> usize { self.tables.read().documents.len() }

    /// Insert a new account; email and card number must both be unused.
    pub fn insert_account(&self, acc: StoredAccount) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if t.by_email.contains_key(&acc.account.email) {
            return Err(StoreError::EmailTaken);
        }
        if t.by_card.contains_key(&acc.account.card_number) {
            return Err(StoreError::CardNumberTaken);
        }
        let id = acc.account.id.clone();
        t.index_account(&acc);
        t.accounts.insert(id.clone(), acc);
        if let Err(e) = self.persist(&t) {
            if let Some(acc) = t.accounts.remove(&id) { t.unindex_account(&acc); }
            return Err(e);
        }
        Ok(())
    }

    pub fn account(&self, id: &str) -> Option<StoredAccount> {
        self.tables.read().accounts.get(id).cloned()
    }

    /// Lookup by email; the argument is normalized first.
    pub fn account_by_email(&self, email: &str) -> Option<StoredAccount> {
        let email = crate::security::normalize_email(email);
        let t = self.tables.read();
        t.by_email.get(&email).and_then(|id| t.accounts.get(id)).cloned()
    }

    /// Find-and-update. Identity fields (`id`, `email`, `cardNumber`, `createdAt`)
    /// are restored after `f` runs; `updatedAt` is refreshed.
    pub fn update_account<F>(&self, id: &str, f: F) -> Result<Option<StoredAccount>, StoreError>
    where
        F: FnOnce(&mut StoredAccount),
    {
        let mut t = self.tables.write();
        let Some(current) = t.accounts.get(id).cloned() else { return Ok(None); };
        let mut next = current.clone();
        f(&mut next);
        next.account.id = current.account.id.clone();
        next.account.email = current.account.email.clone();
        next.account.card_number = current.account.card_number.clone();
        next.account.created_at = current.account.created_at;
        next.account.updated_at = Utc::now();
        t.accounts.insert(id.to_string(), next.clone());
        if let Err(e) = self.persist(&t) {
            t.accounts.insert(id.to_string(), current);
            return Err(e);
        }
        Ok(Some(next))
    }

    pub fn insert_document(&self, doc: Document) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        let id = doc.id.clone();
        t.documents.insert(id.clone(), doc);
        if let Err(e) = self.persist(&t) {
            t.documents.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    /// All documents of one owner, newest upload first.
    pub fn documents_for(&self, owner_id: &str) -> Vec<Document> {
        let t = self.tables.read();
        let mut docs: Vec<Document> = t.documents.values().filter(|d| d.owner_id == owner_id).cloned().collect();
        docs.sort_by(|a, b| b.upload_date.cmp(&a.upload_date).then_with(|| a.id.cmp(&b.id)));
        docs
    }

    /// A document only if `owner_id` owns it.
    pub fn document(&self, owner_id: &str, id: &str) -> Option<Document> {
        let t = self.tables.read();
        t.documents.get(id).filter(|d| d.owner_id == owner_id).cloned()
    }

    /// Find-and-delete filtered by owner. `Ok(None)` when absent or foreign.
    pub fn delete_document(&self, owner_id: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut t = self.tables.write();
        let owned = t.documents.get(id).map(|d| d.owner_id == owner_id).unwrap_or(false);
        if !owned {
            return Ok(None);
        }
        let Some(doc) = t.documents.remove(id) else { return Ok(None); };
        if let Err(e) = self.persist(&t) {
            t.documents.insert(doc.id.clone(), doc);
            return Err(e);
        }
        Ok(Some(doc))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.tables.read();
        f.debug_struct("Store")
            .field("root", &self.root)
            .field("accounts", &t.accounts.len())
            .field("documents", &t.documents.len())
            .finish()
    }
}

/// Thread-safe handle shared by every request handler.
#[derive(Clone, Debug)]
pub struct SharedStore(pub Arc<Store>);

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        Ok(Self(Arc::new(Store::open(root)?)))
    }

    pub fn in_memory() -> Self { Self(Arc::new(Store::in_memory())) }
}

impl Deref for SharedStore {
    type Target = Store;
    fn deref(&self) -> &Store { &self.0 }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
