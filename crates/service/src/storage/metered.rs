use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use models::Note;

use super::{BackendKind, NoteRepository};
use crate::context::OpContext;
use crate::errors::StorageError;
use crate::metrics::{STORAGE_OPERATIONS_TOTAL, STORAGE_OPERATION_DURATION};

/// Records an outcome counter and a latency histogram for every call, then
/// delegates unchanged.
pub struct MeteredRepository {
    inner: Arc<dyn NoteRepository>,
}

impl MeteredRepository {
    pub fn new(inner: Arc<dyn NoteRepository>) -> Self {
        Self { inner }
    }

    async fn observe<T, F>(&self, op: &'static str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        let backend = self.inner.kind().as_str();
        let started = Instant::now();
        let res = fut.await;
        let outcome = match &res {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        STORAGE_OPERATIONS_TOTAL.with_label_values(&[backend, op, outcome]).inc();
        STORAGE_OPERATION_DURATION
            .with_label_values(&[backend, op])
            .observe(started.elapsed().as_secs_f64());
        res
    }
}

#[async_trait]
impl NoteRepository for MeteredRepository {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn create(&self, ctx: &OpContext, note: &Note) -> Result<(), StorageError> {
        self.observe("create", self.inner.create(ctx, note)).await
    }

    async fn get(&self, ctx: &OpContext, id: &str) -> Result<Note, StorageError> {
        self.observe("get", self.inner.get(ctx, id)).await
    }

    async fn list(&self, ctx: &OpContext) -> Result<Vec<Note>, StorageError> {
        self.observe("list", self.inner.list(ctx)).await
    }

    async fn update(&self, ctx: &OpContext, note: Note) -> Result<Note, StorageError> {
        self.observe("update", self.inner.update(ctx, note)).await
    }

    async fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), StorageError> {
        self.observe("delete", self.inner.delete(ctx, id)).await
    }

    async fn close(&self, ctx: &OpContext) -> Result<(), StorageError> {
        self.observe("close", self.inner.close(ctx)).await
    }
}
