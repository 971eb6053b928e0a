//! CouchDB adapter.
//!
//! One document per note at `<server>/<database>/<id>`. Every document carries
//! a `_rev` token that CouchDB requires on update and delete; a stale token is
//! rejected with `409`. The token never leaves this module: update and delete
//! re-read the document to learn it, then write with it. Nothing here retries a
//! rejected write, so a racing writer surfaces as [`StorageError::Conflict`].
//!
//! Ids CouchDB cannot hold as plain documents (empty, or starting with `_`)
//! never reach the server: reads report [`StorageError::NotFound`] and
//! creates fail with [`StorageError::Internal`].

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configs::CouchDbConfig;
use models::Note;
use percent_encoding::percent_decode_str;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{BackendKind, NoteRepository};
use crate::context::OpContext;
use crate::errors::StorageError;

/// Document ids starting with this belong to CouchDB (`_design/...`, `_local/...`).
const RESERVED_PREFIX: char = '_';

pub struct CouchDbNoteRepository {
    http: reqwest::Client,
    db_url: Url,
    credentials: Option<Credentials>,
    closed: AtomicBool,
}

struct Credentials {
    user: String,
    password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NoteDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NoteDocument {
    fn from_note(note: &Note, rev: Option<String>) -> Self {
        Self {
            id: note.id.clone(),
            rev,
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }

    fn into_note(self) -> Note {
        Note {
            id: self.id,
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CouchErrorBody {
    error: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    id: String,
    #[serde(default)]
    doc: Option<serde_json::Value>,
}

/// What the failed request was trying to do; decides how `409` reads.
#[derive(Clone, Copy)]
enum Intent {
    Create,
    Read,
    Write,
}

impl CouchDbNoteRepository {
    /// Reach the server, retrying `connect_attempts` times with a fixed
    /// `connect_backoff` in between, then make sure the database exists.
    pub async fn connect(cfg: &CouchDbConfig) -> Result<Self, StorageError> {
        let (server_url, credentials) = split_credentials(&cfg.url)?;
        let mut db_url = server_url.clone();
        db_url
            .path_segments_mut()
            .map_err(|_| StorageError::Internal(format!("CouchDB URL cannot hold a path: {server_url}")))?
            .pop_if_empty()
            .push(&cfg.database);

        let http = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout())
            .build()
            .map_err(|e| StorageError::Internal(format!("http client: {e}")))?;
        let repo = Self { http, db_url, credentials, closed: AtomicBool::new(false) };

        repo.wait_until_reachable(&server_url, cfg.connect_attempts.max(1), cfg.connect_backoff())
            .await?;
        repo.ensure_database().await?;
        info!(backend = "couchdb", url = %server_url, database = %cfg.database, "connected to CouchDB");
        Ok(repo)
    }

    async fn wait_until_reachable(&self, server_url: &Url, attempts: u32, backoff: Duration) -> Result<(), StorageError> {
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.request(Method::GET, server_url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => last_error = format!("status {}", resp.status()),
                Err(e) => last_error = e.to_string(),
            }
            warn!(attempt, attempts, error = %last_error, "CouchDB not reachable yet");
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
            }
        }
        Err(StorageError::Unavailable(format!(
            "CouchDB at {server_url} unreachable after {attempts} attempts: {last_error}"
        )))
    }

    async fn ensure_database(&self) -> Result<(), StorageError> {
        let head = self.request(Method::HEAD, self.db_url.clone()).send().await.map_err(transport_error)?;
        if head.status().is_success() {
            return Ok(());
        }
        if head.status() != StatusCode::NOT_FOUND {
            return Err(failure(head, "", Intent::Read).await);
        }

        debug!(url = %self.db_url, "creating CouchDB database");
        let created = self.request(Method::PUT, self.db_url.clone()).send().await.map_err(transport_error)?;
        match created.status() {
            // 412: another instance created it first
            s if s.is_success() || s == StatusCode::PRECONDITION_FAILED => Ok(()),
            _ => Err(failure(created, "", Intent::Create).await),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some(c) => builder.basic_auth(&c.user, c.password.as_deref()),
            None => builder,
        }
    }

    fn doc_url(&self, id: &str) -> Result<Url, StorageError> {
        let mut url = self.db_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Internal("database URL cannot hold a path".into()))?
            .push(id);
        Ok(url)
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable("storage closed".into()));
        }
        Ok(())
    }

    /// Current document including its revision token.
    async fn fetch(&self, ctx: &OpContext, id: &str) -> Result<NoteDocument, StorageError> {
        // "" would GET the database info, "_all_docs" etc. a system endpoint
        if !is_plain_document_id(id) {
            return Err(StorageError::not_found(id));
        }
        let url = self.doc_url(id)?;
        ctx.run(async {
            let resp = self.request(Method::GET, url).send().await.map_err(transport_error)?;
            if !resp.status().is_success() {
                return Err(failure(resp, id, Intent::Read).await);
            }
            resp.json::<NoteDocument>()
                .await
                .map_err(|e| StorageError::Internal(format!("decode note {id}: {e}")))
        })
        .await
    }

    async fn write(&self, ctx: &OpContext, doc: &NoteDocument, intent: Intent) -> Result<(), StorageError> {
        let url = self.doc_url(&doc.id)?;
        ctx.run(async {
            let resp = self.request(Method::PUT, url).json(doc).send().await.map_err(transport_error)?;
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(failure(resp, &doc.id, intent).await)
            }
        })
        .await
    }
}

#[async_trait]
impl NoteRepository for CouchDbNoteRepository {
    fn kind(&self) -> BackendKind {
        BackendKind::CouchDb
    }

    async fn create(&self, ctx: &OpContext, note: &Note) -> Result<(), StorageError> {
        self.ensure_open()?;
        if note.id.is_empty() {
            return Err(StorageError::Internal("CouchDB documents need a non-empty id".into()));
        }
        if !is_plain_document_id(&note.id) {
            return Err(StorageError::Internal(format!(
                "CouchDB reserves document ids starting with '{RESERVED_PREFIX}': {}",
                note.id
            )));
        }
        self.write(ctx, &NoteDocument::from_note(note, None), Intent::Create).await
    }

    async fn get(&self, ctx: &OpContext, id: &str) -> Result<Note, StorageError> {
        self.ensure_open()?;
        self.fetch(ctx, id).await.map(NoteDocument::into_note)
    }

    async fn list(&self, ctx: &OpContext) -> Result<Vec<Note>, StorageError> {
        self.ensure_open()?;
        let mut url = self.doc_url("_all_docs")?;
        url.query_pairs_mut().append_pair("include_docs", "true");
        let all: AllDocsResponse = ctx
            .run(async {
                let resp = self.request(Method::GET, url).send().await.map_err(transport_error)?;
                if !resp.status().is_success() {
                    return Err(failure(resp, "_all_docs", Intent::Read).await);
                }
                resp.json().await.map_err(|e| StorageError::Internal(format!("decode _all_docs: {e}")))
            })
            .await?;

        all.rows
            .into_iter()
            .filter(|row| !row.id.starts_with(RESERVED_PREFIX))
            .filter_map(|row| row.doc)
            .map(|doc| {
                serde_json::from_value::<NoteDocument>(doc)
                    .map(NoteDocument::into_note)
                    .map_err(|e| StorageError::Internal(format!("decode listed note: {e}")))
            })
            .collect()
    }

    async fn update(&self, ctx: &OpContext, mut note: Note) -> Result<Note, StorageError> {
        self.ensure_open()?;
        let current = self.fetch(ctx, &note.id).await?;
        note.touch();
        self.write(ctx, &NoteDocument::from_note(&note, current.rev), Intent::Write).await?;
        Ok(note)
    }

    async fn delete(&self, ctx: &OpContext, id: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        let current = self.fetch(ctx, id).await?;
        let mut url = self.doc_url(id)?;
        if let Some(rev) = current.rev.as_deref() {
            url.query_pairs_mut().append_pair("rev", rev);
        }
        ctx.run(async {
            let resp = self.request(Method::DELETE, url).send().await.map_err(transport_error)?;
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(failure(resp, id, Intent::Write).await)
            }
        })
        .await
    }

    async fn close(&self, ctx: &OpContext) -> Result<(), StorageError> {
        ctx.check()?;
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(backend = "couchdb", url = %self.db_url, "CouchDB storage closed");
        }
        Ok(())
    }
}

fn is_plain_document_id(id: &str) -> bool {
    !id.is_empty() && !id.starts_with(RESERVED_PREFIX)
}

/// Move `user:password@` out of the URL so it never shows up in logs.
/// The URL keeps userinfo percent-encoded; basic auth wants the raw text.
fn split_credentials(raw: &str) -> Result<(Url, Option<Credentials>), StorageError> {
    let mut url =
        Url::parse(raw).map_err(|e| StorageError::Internal(format!("invalid CouchDB URL: {e}")))?;
    if url.username().is_empty() {
        return Ok((url, None));
    }
    let credentials = Credentials {
        user: decode_userinfo(url.username())?,
        password: url.password().map(decode_userinfo).transpose()?,
    };
    // only fails for URLs that cannot carry credentials, which `username()` ruled out
    let _ = url.set_username("");
    let _ = url.set_password(None);
    Ok((url, Some(credentials)))
}

fn decode_userinfo(raw: &str) -> Result<String, StorageError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| StorageError::Internal(format!("CouchDB credentials are not valid UTF-8: {e}")))
}

fn transport_error(err: reqwest::Error) -> StorageError {
    if err.is_timeout() {
        StorageError::DeadlineExceeded
    } else if err.is_connect() {
        StorageError::Unavailable(err.to_string())
    } else {
        StorageError::Internal(err.to_string())
    }
}

async fn failure(resp: Response, id: &str, intent: Intent) -> StorageError {
    let status = resp.status();
    let body = resp.json::<CouchErrorBody>().await.ok();
    classify(status, body.as_ref(), id, intent)
}

fn classify(status: StatusCode, body: Option<&CouchErrorBody>, id: &str, intent: Intent) -> StorageError {
    let detail = match body {
        Some(b) if b.reason.is_empty() => b.error.clone(),
        Some(b) => format!("{}: {}", b.error, b.reason),
        None => status.to_string(),
    };
    match status {
        StatusCode::NOT_FOUND => match body.map(|b| b.reason.as_str()) {
            None | Some("missing") | Some("deleted") => StorageError::not_found(id),
            // e.g. "Database does not exist."
            Some(_) => StorageError::Internal(format!("CouchDB 404: {detail}")),
        },
        StatusCode::CONFLICT => match intent {
            Intent::Create => StorageError::AlreadyExists(id.to_string()),
            Intent::Write => StorageError::Conflict(id.to_string()),
            Intent::Read => StorageError::Internal(format!("CouchDB 409: {detail}")),
        },
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            StorageError::Unavailable(format!("CouchDB {status}: {detail}"))
        }
        _ => StorageError::Internal(format!("CouchDB {status}: {detail}")),
    }
}
