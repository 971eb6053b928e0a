//! Note persistence behind one contract.
//!
//! [`NoteRepository`] is implemented by three adapters with different
//! mechanics but identical observable semantics:
//!
//! | Adapter | Concurrency control | Update/delete miss detection |
//! |---------|---------------------|------------------------------|
//! | [`memory::InMemoryNoteRepository`] | one reader/writer lock | map lookup under the write lock |
//! | [`couchdb::CouchDbNoteRepository`] | per-document revision token | re-read before writing |
//! | [`mongo::MongoNoteRepository`] | atomic match-and-replace | matched/deleted count of zero |
//!
//! [`selector::connect`] picks one from configuration.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use models::Note;

use crate::context::OpContext;
use crate::errors::StorageError;

pub mod couchdb;
pub mod memory;
pub mod metered;
pub mod mongo;
pub mod selector;

#[cfg(test)]
pub(crate) mod contract;

pub use couchdb::CouchDbNoteRepository;
pub use memory::InMemoryNoteRepository;
pub use metered::MeteredRepository;
pub use mongo::MongoNoteRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Memory,
    CouchDb,
    MongoDb,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::CouchDb => "couchdb",
            BackendKind::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" => Ok(BackendKind::Memory),
            "couchdb" | "couch" => Ok(BackendKind::CouchDb),
            "mongodb" | "mongo" => Ok(BackendKind::MongoDb),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// Storage contract for notes.
///
/// Every operation honors `ctx`: once it is cancelled or past its deadline the
/// call returns [`StorageError::Cancelled`] or [`StorageError::DeadlineExceeded`].
/// Identifier validation is the caller's job; adapters accept any string.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Persist a new note. An existing note with the same id yields
    /// [`StorageError::AlreadyExists`] and leaves the stored note untouched.
    async fn create(&self, ctx: &OpContext, note: &Note) -> Result<(), StorageError>;

    async fn get(&self, ctx: &OpContext, id: &str) -> Result<Note, StorageError>;

    /// All user notes in unspecified order. Backend bookkeeping records are
    /// never included.
    async fn list(&self, ctx: &OpContext) -> Result<Vec<Note>, StorageError>;

    /// Replace the stored note carrying `note.id` with `note`, refreshing
    /// `updated_at`, and return what was committed. Never inserts.
    async fn update(&self, ctx: &OpContext, note: Note) -> Result<Note, StorageError>;

    async fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), StorageError>;

    /// Release backend resources. Idempotent. Other operations fail with
    /// [`StorageError::Unavailable`] afterwards, except on the in-memory adapter.
    async fn close(&self, ctx: &OpContext) -> Result<(), StorageError>;
}
