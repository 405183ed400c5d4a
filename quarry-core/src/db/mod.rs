//! Database handles.
//!
//! A handle holds its shard list behind `Mutex<Arc<..>>`: every operation
//! snapshots the pointer inside a short critical section, releases the
//! lock, then calls through. The lock is never held across real work.
//! Assignment rebinds the pointer; assigning a read-only database into a
//! writable handle is an invalid argument.

mod shard;

pub use shard::Shard;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::DocId;

#[derive(Debug)]
pub(crate) struct DatabaseInner {
    pub shards: Vec<Arc<Shard>>,
    pub writable: bool,
}

/// A handle onto one or more shards, possibly read-only.
#[derive(Debug)]
pub struct Database {
    internal: Mutex<Arc<DatabaseInner>>,
}

impl Database {
    fn from_inner(inner: Arc<DatabaseInner>) -> Self {
        Self {
            internal: Mutex::new(inner),
        }
    }

    /// A fresh single-shard in-memory database, read-only from this handle.
    pub fn inmemory() -> Self {
        Self::from_inner(Arc::new(DatabaseInner {
            shards: vec![Arc::new(Shard::new())],
            writable: false,
        }))
    }

    /// Compose several databases into one multi-shard view. Shard-local
    /// docids interleave into global ones.
    pub fn compound(parts: &[&Database]) -> Self {
        let mut shards = Vec::new();
        for part in parts {
            shards.extend(part.snapshot().shards.iter().cloned());
        }
        Self::from_inner(Arc::new(DatabaseInner {
            shards,
            writable: false,
        }))
    }

    /// Copy the internal pointer under the lock.
    pub(crate) fn snapshot(&self) -> Arc<DatabaseInner> {
        self.internal.lock().clone()
    }

    pub fn is_writable(&self) -> bool {
        self.snapshot().writable
    }

    pub fn shards(&self) -> Vec<Arc<Shard>> {
        self.snapshot().shards.clone()
    }

    pub fn num_shards(&self) -> usize {
        self.snapshot().shards.len()
    }

    pub fn num_docs(&self) -> u32 {
        self.snapshot().shards.iter().map(|s| s.num_docs()).sum()
    }

    /// Map a (shard index, local docid) pair to a global docid.
    pub fn global_docid(&self, shard_idx: usize, local: DocId) -> DocId {
        let n = self.num_shards() as u32;
        (local - 1) * n + shard_idx as u32 + 1
    }

    /// Fetch a document by global docid.
    pub fn get_document(&self, did: DocId) -> Result<Document> {
        if did == 0 {
            return Err(Error::InvalidArgument("document id 0 is reserved".into()));
        }
        let inner = self.snapshot();
        let n = inner.shards.len() as u32;
        let shard_idx = ((did - 1) % n) as usize;
        let local = (did - 1) / n + 1;
        inner.shards[shard_idx].get_document(local)
    }

    /// Rebind this handle to the same shards as `other`.
    pub fn assign(&self, other: &Database) {
        let incoming = other.snapshot();
        *self.internal.lock() = incoming;
    }

    /// Another handle onto the same shards.
    pub fn reopen(&self) -> Database {
        Self::from_inner(self.snapshot())
    }
}

/// A writable single-shard database.
///
/// Every operation snapshots the internal pointer under the lock and calls
/// through outside it.
#[derive(Debug)]
pub struct WritableDatabase {
    db: Database,
}

impl Default for WritableDatabase {
    fn default() -> Self {
        Self::inmemory()
    }
}

impl WritableDatabase {
    pub fn inmemory() -> Self {
        Self {
            db: Database::from_inner(Arc::new(DatabaseInner {
                shards: vec![Arc::new(Shard::new())],
                writable: true,
            })),
        }
    }

    /// The read view of this database; shares the same shard.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// A detached read handle onto the same shard.
    pub fn reopen(&self) -> Database {
        self.db.reopen()
    }

    fn shard(&self) -> Arc<Shard> {
        // Get the pointer while locked, in case someone is assigning to it.
        let inner = self.db.snapshot();
        inner.shards[0].clone()
    }

    pub fn add_document(&self, doc: &Document) -> Result<DocId> {
        if doc.has_empty_term() {
            return Err(Error::InvalidArgument(
                "cannot add terms of zero length to the database".into(),
            ));
        }
        self.shard().add_document(doc)
    }

    pub fn replace_document(&self, did: DocId, doc: &Document) -> Result<()> {
        if doc.has_empty_term() {
            return Err(Error::InvalidArgument(
                "cannot add terms of zero length to the database".into(),
            ));
        }
        self.shard().replace_document(did, doc)
    }

    pub fn delete_document(&self, did: DocId) -> Result<()> {
        self.shard().delete_document(did)
    }

    pub fn get_document(&self, did: DocId) -> Result<Document> {
        self.shard().get_document(did)
    }

    pub fn begin_session(&self) -> Result<()> {
        self.shard().begin_session()
    }

    pub fn end_session(&self) -> Result<()> {
        self.shard().end_session()
    }

    pub fn flush(&self) -> Result<()> {
        self.shard().flush()
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.shard().begin_transaction()
    }

    pub fn commit_transaction(&self) -> Result<()> {
        self.shard().commit_transaction()
    }

    pub fn cancel_transaction(&self) -> Result<()> {
        self.shard().cancel_transaction()
    }

    /// Rebind this writable handle to another database, which must itself
    /// be writable.
    pub fn assign(&self, other: &Database) -> Result<()> {
        if !other.is_writable() {
            return Err(Error::InvalidArgument(
                "cannot assign a readonly database to a writable database".into(),
            ));
        }
        self.db.assign(other);
        Ok(())
    }

    /// Rebind to another writable database's shard.
    pub fn assign_writable(&self, other: &WritableDatabase) {
        self.db.assign(&other.db);
    }
}
