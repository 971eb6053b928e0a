use std::sync::Arc;
use std::time::Duration;

use models::{validate_note_id, Note, NoteInput};
use tracing::{debug, info, instrument, warn};

use crate::context::OpContext;
use crate::errors::{ServiceError, StorageError};
use crate::storage::{BackendKind, NoteRepository};

const SAMPLE_NOTES: [(&str, &str); 3] = [
    (
        "Welcome to Notes API",
        "This is a simple notes management API with REST and gRPC interfaces.",
    ),
    (
        "How to use the API",
        "You can create, read, update, and delete notes using the REST API or gRPC.",
    ),
    (
        "REST API Endpoints",
        "GET /api/notes - List all notes\nGET /api/notes/{id} - Get a note by ID\nPOST /api/notes - Create a new note\nPUT /api/notes/{id} - Update a note\nDELETE /api/notes/{id} - Delete a note",
    ),
];

/// Note use cases on top of any [`NoteRepository`], independent of transport.
///
/// Identifiers coming from callers are validated here; the repository itself
/// accepts any string.
pub struct NoteService<R: NoteRepository + ?Sized = dyn NoteRepository> {
    repo: Arc<R>,
}

impl<R: NoteRepository + ?Sized> Clone for NoteService<R> {
    fn clone(&self) -> Self {
        Self { repo: Arc::clone(&self.repo) }
    }
}

impl<R: NoteRepository + ?Sized> NoteService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub fn backend(&self) -> BackendKind {
        self.repo.kind()
    }

    /// Create a note under a freshly generated identifier.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use models::NoteInput;
    /// use service::context::OpContext;
    /// use service::note_service::NoteService;
    /// use service::storage::InMemoryNoteRepository;
    ///
    /// let svc = NoteService::new(Arc::new(InMemoryNoteRepository::new()));
    /// let ctx = OpContext::background();
    /// let input = NoteInput { title: "Groceries".into(), content: "milk".into() };
    /// let note = tokio_test::block_on(svc.create(&ctx, input)).unwrap();
    /// assert_eq!(note.title, "Groceries");
    /// assert_eq!(tokio_test::block_on(svc.get(&ctx, &note.id)).unwrap(), note);
    /// ```
    #[instrument(skip(self, ctx, input))]
    pub async fn create(&self, ctx: &OpContext, input: NoteInput) -> Result<Note, ServiceError> {
        let note = Note::new(input.title, input.content);
        self.repo.create(ctx, &note).await?;
        info!(note_id = %note.id, backend = %self.backend(), "note_created");
        Ok(note)
    }

    #[instrument(skip(self, ctx, input))]
    pub async fn create_with_id(&self, ctx: &OpContext, id: &str, input: NoteInput) -> Result<Note, ServiceError> {
        validate_note_id(id)?;
        let note = Note::with_id(id, input.title, input.content);
        self.repo.create(ctx, &note).await?;
        info!(note_id = %note.id, backend = %self.backend(), "note_created");
        Ok(note)
    }

    #[instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &OpContext, id: &str) -> Result<Note, ServiceError> {
        validate_note_id(id)?;
        Ok(self.repo.get(ctx, id).await?)
    }

    /// All notes, oldest first (ties broken by id).
    #[instrument(skip(self, ctx))]
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<Note>, ServiceError> {
        let mut notes = self.repo.list(ctx).await?;
        notes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(notes)
    }

    /// Replace title and content of an existing note. `created_at` is kept.
    #[instrument(skip(self, ctx, input))]
    pub async fn update(&self, ctx: &OpContext, id: &str, input: NoteInput) -> Result<Note, ServiceError> {
        validate_note_id(id)?;
        let mut note = self.repo.get(ctx, id).await?;
        note.apply(input);
        let committed = self.repo.update(ctx, note).await?;
        info!(note_id = %committed.id, backend = %self.backend(), "note_updated");
        Ok(committed)
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), ServiceError> {
        validate_note_id(id)?;
        self.repo.delete(ctx, id).await?;
        info!(note_id = %id, backend = %self.backend(), "note_deleted");
        Ok(())
    }

    pub async fn close(&self, ctx: &OpContext) -> Result<(), ServiceError> {
        Ok(self.repo.close(ctx).await?)
    }

    /// Insert the welcome notes. Notes that already exist are skipped, so
    /// running this against a persistent store twice is harmless.
    pub async fn seed_sample_notes(&self, ctx: &OpContext) -> Result<usize, ServiceError> {
        let mut created = 0;
        for (title, content) in SAMPLE_NOTES {
            let note = Note::new(title, content);
            match self.repo.create(ctx, &note).await {
                Ok(()) => {
                    debug!(note_id = %note.id, "sample note created");
                    created += 1;
                }
                Err(StorageError::AlreadyExists(id)) => warn!(note_id = %id, "sample note already exists"),
                Err(e) => return Err(e.into()),
            }
            // generated ids have microsecond resolution
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        info!(created, backend = %self.backend(), "sample notes seeded");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryNoteRepository;

    fn service() -> NoteService {
        let repo: Arc<dyn NoteRepository> = Arc::new(InMemoryNoteRepository::new());
        NoteService::new(repo)
    }

    fn input(title: &str, content: &str) -> NoteInput {
        NoteInput { title: title.into(), content: content.into() }
    }

    #[tokio::test]
    async fn crud_flow() -> Result<(), anyhow::Error> {
        let svc = service();
        let ctx = OpContext::background();

        let note = svc.create_with_id(&ctx, "n1", input("T", "C")).await?;
        assert_eq!(svc.get(&ctx, "n1").await?, note);

        let updated = svc.update(&ctx, "n1", input("T2", "C2")).await?;
        assert_eq!((updated.title.as_str(), updated.content.as_str()), ("T2", "C2"));
        assert_eq!(updated.created_at, note.created_at);
        assert!(updated.updated_at >= note.updated_at);

        svc.delete(&ctx, "n1").await?;
        assert!(svc.get(&ctx, "n1").await.unwrap_err().is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_ids_never_reach_storage() {
        let svc = service();
        let ctx = OpContext::background();
        for bad in ["", "has space", "../etc"] {
            assert!(matches!(svc.get(&ctx, bad).await, Err(ServiceError::Validation(_))));
            assert!(matches!(svc.delete(&ctx, bad).await, Err(ServiceError::Validation(_))));
            assert!(matches!(svc.update(&ctx, bad, input("T", "C")).await, Err(ServiceError::Validation(_))));
            assert!(matches!(svc.create_with_id(&ctx, bad, input("T", "C")).await, Err(ServiceError::Validation(_))));
        }
        assert!(svc.list(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_note_is_not_found() {
        let svc = service();
        let err = svc.update(&OpContext::background(), "ghost", input("T", "C")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn duplicate_id_is_already_exists() {
        let svc = service();
        let ctx = OpContext::background();
        svc.create_with_id(&ctx, "dup", input("first", "")).await.unwrap();
        let err = svc.create_with_id(&ctx, "dup", input("second", "")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn list_is_ordered_by_creation() {
        let svc = service();
        let ctx = OpContext::background();
        for id in ["c", "a", "b"] {
            svc.create_with_id(&ctx, id, input(id, "")).await.unwrap();
        }
        let listed = svc.list(&ctx).await.unwrap();
        for pair in listed.windows(2) {
            assert!((pair[0].created_at, &pair[0].id) <= (pair[1].created_at, &pair[1].id));
        }
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn seeding_creates_three_welcome_notes() {
        let svc = service();
        let ctx = OpContext::background();
        assert_eq!(svc.seed_sample_notes(&ctx).await.unwrap(), 3);
        let notes = svc.list(&ctx).await.unwrap();
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].title, "Welcome to Notes API");
        assert!(notes.iter().all(|n| validate_note_id(&n.id).is_ok()));
    }

    #[tokio::test]
    async fn seeding_stops_on_cancelled_context() {
        let svc = service();
        let (ctx, handle) = OpContext::cancellable();
        handle.cancel();
        let err = svc.seed_sample_notes(&ctx).await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(StorageError::Cancelled)));
    }
}
