//! Service layer for notes.
//! - `storage`: the repository contract and its memory, CouchDB and MongoDB adapters.
//! - `note_service`: business operations on top of any repository.
//! - Errors are normalized at the storage boundary into [`errors::StorageError`].

pub mod context;
pub mod errors;
pub mod metrics;
pub mod note_service;
pub mod storage;

pub use context::{CancelHandle, OpContext};
pub use errors::{ServiceError, StorageError};
pub use note_service::NoteService;
