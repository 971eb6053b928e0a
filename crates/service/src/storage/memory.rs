use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use models::Note;
use tokio::sync::RwLock;

use super::{BackendKind, NoteRepository};
use crate::context::OpContext;
use crate::errors::StorageError;

/// Process-local note map.
///
/// Readers share the lock, writers take it exclusively. Nothing survives a
/// restart and `close` does not disable the store.
#[derive(Default)]
pub struct InMemoryNoteRepository {
    notes: RwLock<HashMap<String, Note>>,
}

impl InMemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }
}

#[async_trait]
impl NoteRepository for InMemoryNoteRepository {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn create(&self, ctx: &OpContext, note: &Note) -> Result<(), StorageError> {
        ctx.run(async {
            let mut map = self.notes.write().await;
            match map.entry(note.id.clone()) {
                Entry::Occupied(_) => Err(StorageError::AlreadyExists(note.id.clone())),
                Entry::Vacant(slot) => {
                    slot.insert(note.clone());
                    Ok(())
                }
            }
        })
        .await
    }

    async fn get(&self, ctx: &OpContext, id: &str) -> Result<Note, StorageError> {
        ctx.run(async {
            let map = self.notes.read().await;
            map.get(id).cloned().ok_or_else(|| StorageError::not_found(id))
        })
        .await
    }

    async fn list(&self, ctx: &OpContext) -> Result<Vec<Note>, StorageError> {
        ctx.run(async {
            let map = self.notes.read().await;
            Ok(map.values().cloned().collect())
        })
        .await
    }

    async fn update(&self, ctx: &OpContext, mut note: Note) -> Result<Note, StorageError> {
        ctx.run(async move {
            let mut map = self.notes.write().await;
            let Some(slot) = map.get_mut(&note.id) else {
                return Err(StorageError::not_found(&note.id));
            };
            note.touch();
            *slot = note.clone();
            Ok(note)
        })
        .await
    }

    async fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), StorageError> {
        ctx.run(async {
            let mut map = self.notes.write().await;
            map.remove(id).map(|_| ()).ok_or_else(|| StorageError::not_found(id))
        })
        .await
    }

    async fn close(&self, ctx: &OpContext) -> Result<(), StorageError> {
        ctx.check()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::contract;

    #[tokio::test]
    async fn satisfies_repository_contract() {
        let repo = InMemoryNoteRepository::new();
        contract::run_all(&repo).await;
    }

    #[tokio::test]
    async fn accepts_empty_id() {
        let repo = InMemoryNoteRepository::new();
        let ctx = OpContext::background();
        repo.create(&ctx, &Note::with_id("", "T", "C")).await.unwrap();
        assert_eq!(repo.get(&ctx, "").await.unwrap().title, "T");
        repo.delete(&ctx, "").await.unwrap();
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn stays_usable_after_close() {
        let repo = InMemoryNoteRepository::new();
        let ctx = OpContext::background();
        repo.close(&ctx).await.unwrap();
        repo.create(&ctx, &Note::with_id("n1", "T", "C")).await.unwrap();
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_and_readers() {
        let repo = Arc::new(InMemoryNoteRepository::new());
        let mut tasks = Vec::new();
        for i in 0..32 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                let ctx = OpContext::background();
                let id = format!("note-{i}");
                repo.create(&ctx, &Note::with_id(&id, "T", "C")).await?;
                let mut note = repo.get(&ctx, &id).await?;
                note.title = format!("T{i}");
                repo.update(&ctx, note).await?;
                repo.list(&ctx).await.map(|_| ())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let ctx = OpContext::background();
        let notes = repo.list(&ctx).await.unwrap();
        assert_eq!(notes.len(), 32);
        assert!(notes.iter().all(|n| n.title.starts_with('T') && n.title.len() > 1));
    }

    #[tokio::test]
    async fn racing_creates_admit_one_winner() {
        let repo = Arc::new(InMemoryNoteRepository::new());
        let attempts = (0..8).map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.create(&OpContext::background(), &Note::with_id("same", format!("{i}"), "C")).await
            })
        });
        let results = futures::future::join_all(attempts).await;
        let wins = results.into_iter().filter(|r| matches!(r, Ok(Ok(())))).count();
        assert_eq!(wins, 1);
    }
}
