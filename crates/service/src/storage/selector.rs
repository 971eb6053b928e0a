use std::sync::Arc;

use configs::StorageConfig;
use tracing::{info, warn};

use super::{
    BackendKind, CouchDbNoteRepository, InMemoryNoteRepository, MeteredRepository, MongoNoteRepository,
    NoteRepository,
};
use crate::errors::StorageError;

/// Open the configured backend, falling back to memory when the name is
/// unknown or the external store cannot be reached. Never fails: startup
/// keeps serving from memory instead.
pub async fn connect(cfg: &StorageConfig) -> Arc<dyn NoteRepository> {
    let repo: Arc<dyn NoteRepository> = match cfg.backend.parse::<BackendKind>() {
        Ok(kind) => match open(kind, cfg).await {
            Ok(repo) => repo,
            Err(e) => {
                warn!(
                    backend = %kind,
                    error = %e,
                    code = e.code(),
                    event = "storage_fallback",
                    "failed to initialize storage, falling back to in-memory storage"
                );
                Arc::new(InMemoryNoteRepository::new())
            }
        },
        Err(e) => {
            warn!(error = %e, event = "storage_fallback", "unknown storage type, using in-memory storage");
            Arc::new(InMemoryNoteRepository::new())
        }
    };
    info!(backend = %repo.kind(), event = "storage_ready", "storage backend selected");
    Arc::new(MeteredRepository::new(repo))
}

async fn open(kind: BackendKind, cfg: &StorageConfig) -> Result<Arc<dyn NoteRepository>, StorageError> {
    Ok(match kind {
        BackendKind::Memory => Arc::new(InMemoryNoteRepository::new()),
        BackendKind::CouchDb => Arc::new(CouchDbNoteRepository::connect(&cfg.couchdb).await?),
        BackendKind::MongoDb => Arc::new(MongoNoteRepository::connect(&cfg.mongodb).await?),
    })
}
