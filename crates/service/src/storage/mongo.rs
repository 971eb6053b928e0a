//! MongoDB adapter.
//!
//! One document per note in the configured collection, keyed by `_id`.
//! Updates are a single atomic `replaceOne` and deletes a single `deleteOne`;
//! a matched or deleted count of zero means the note does not exist.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configs::MongoDbConfig;
use futures::TryStreamExt;
use models::Note;
use mongodb::bson::doc;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{BackendKind, NoteRepository};
use crate::context::OpContext;
use crate::errors::StorageError;

const DUPLICATE_KEY: i32 = 11000;
const APP_NAME: &str = "simple-notes";
/// Upper bound on waiting for in-flight operations when closing.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

pub struct MongoNoteRepository {
    client: Client,
    collection: Collection<NoteRecord>,
    closed: AtomicBool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NoteRecord {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Note> for NoteRecord {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

impl From<NoteRecord> for Note {
    fn from(r: NoteRecord) -> Self {
        Note { id: r.id, title: r.title, content: r.content, created_at: r.created_at, updated_at: r.updated_at }
    }
}

impl MongoNoteRepository {
    /// Build a client and ping the server once. Both the driver's connect and
    /// server-selection timeouts are set to `connect_timeout_ms`.
    pub async fn connect(cfg: &MongoDbConfig) -> Result<Self, StorageError> {
        let timeout = cfg.connect_timeout();
        let mut options = ClientOptions::parse(&cfg.uri).await.map_err(|e| map_mongo_error(e, ""))?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name.get_or_insert_with(|| APP_NAME.to_string());
        let hosts: Vec<String> = options.hosts.iter().map(ToString::to_string).collect();

        let client = Client::with_options(options).map_err(|e| map_mongo_error(e, ""))?;
        let ping = tokio::time::timeout(timeout, async {
            client.database("admin").run_command(doc! { "ping": 1 }).await
        })
        .await;
        match ping {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(StorageError::Unavailable(format!("MongoDB ping failed: {e}"))),
            Err(_) => return Err(StorageError::Unavailable(format!("MongoDB ping timed out after {timeout:?}"))),
        }

        let collection = client.database(&cfg.database).collection::<NoteRecord>(&cfg.collection);
        info!(
            backend = "mongodb",
            hosts = ?hosts,
            database = %cfg.database,
            collection = %cfg.collection,
            "connected to MongoDB"
        );
        Ok(Self { client, collection, closed: AtomicBool::new(false) })
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable("storage closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NoteRepository for MongoNoteRepository {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDb
    }

    async fn create(&self, ctx: &OpContext, note: &Note) -> Result<(), StorageError> {
        self.ensure_open()?;
        let record = NoteRecord::from(note);
        ctx.run(async {
            self.collection
                .insert_one(&record)
                .await
                .map(|_| ())
                .map_err(|e| map_mongo_error(e, &note.id))
        })
        .await
    }

    async fn get(&self, ctx: &OpContext, id: &str) -> Result<Note, StorageError> {
        self.ensure_open()?;
        ctx.run(async {
            match self.collection.find_one(doc! { "_id": id }).await {
                Ok(Some(record)) => Ok(record.into()),
                Ok(None) => Err(StorageError::not_found(id)),
                Err(e) => Err(map_mongo_error(e, id)),
            }
        })
        .await
    }

    async fn list(&self, ctx: &OpContext) -> Result<Vec<Note>, StorageError> {
        self.ensure_open()?;
        ctx.run(async {
            let cursor = self.collection.find(doc! {}).await.map_err(|e| map_mongo_error(e, ""))?;
            let records: Vec<NoteRecord> = cursor.try_collect().await.map_err(|e| map_mongo_error(e, ""))?;
            Ok(records.into_iter().map(Note::from).collect())
        })
        .await
    }

    async fn update(&self, ctx: &OpContext, mut note: Note) -> Result<Note, StorageError> {
        self.ensure_open()?;
        note.touch();
        let record = NoteRecord::from(&note);
        let result = ctx
            .run(async {
                self.collection
                    .replace_one(doc! { "_id": note.id.as_str() }, &record)
                    .await
                    .map_err(|e| map_mongo_error(e, &note.id))
            })
            .await?;
        require_match(result.matched_count, &note.id)?;
        Ok(note)
    }

    async fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        let result = ctx
            .run(async {
                self.collection.delete_one(doc! { "_id": id }).await.map_err(|e| map_mongo_error(e, id))
            })
            .await?;
        require_match(result.deleted_count, id)
    }

    async fn close(&self, ctx: &OpContext) -> Result<(), StorageError> {
        ctx.check()?;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let client = self.client.clone();
        ctx.run(async {
            if tokio::time::timeout(CLOSE_GRACE, async { client.shutdown().await }).await.is_err() {
                warn!(backend = "mongodb", "MongoDB client shutdown did not finish in {CLOSE_GRACE:?}");
            }
            Ok(())
        })
        .await?;
        info!(backend = "mongodb", "MongoDB storage closed");
        Ok(())
    }
}

/// Replace and delete report how many documents they touched; zero means no such id.
fn require_match(count: u64, id: &str) -> Result<(), StorageError> {
    if count == 0 {
        return Err(StorageError::not_found(id));
    }
    Ok(())
}

fn map_mongo_error(err: MongoError, id: &str) -> StorageError {
    let code = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => Some(we.code),
        _ => None,
    };
    if is_duplicate_key(code, &err.to_string()) {
        return StorageError::AlreadyExists(id.to_string());
    }
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::Shutdown => StorageError::Unavailable(err.to_string()),
        _ => StorageError::Internal(err.to_string()),
    }
}

/// Bulk and command paths only carry the code inside the message text.
fn is_duplicate_key(code: Option<i32>, message: &str) -> bool {
    code == Some(DUPLICATE_KEY) || message.contains("E11000")
}
