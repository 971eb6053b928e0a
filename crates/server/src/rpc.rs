//! RPC surface over the same note operations as the REST API.
//!
//! No wire protocol is served: [`RpcServer::start`] binds the configured port,
//! logs the bound address and releases it. The procedures are plain async
//! methods returning gRPC-style [`RpcStatus`] errors.

use std::fmt;
use std::net::SocketAddr;

use models::{Note, NoteInput};
use service::{NoteService, OpContext, ServiceError, StorageError};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::errors::StartupError;

/// Status codes numbered as in gRPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    Cancelled = 1,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    Aborted = 10,
    Internal = 13,
    Unavailable = 14,
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RpcCode::Cancelled => "CANCELLED",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::AlreadyExists => "ALREADY_EXISTS",
            RpcCode::Aborted => "ABORTED",
            RpcCode::Internal => "INTERNAL",
            RpcCode::Unavailable => "UNAVAILABLE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl From<ServiceError> for RpcStatus {
    fn from(err: ServiceError) -> Self {
        let code = match &err {
            ServiceError::Validation(_) => RpcCode::InvalidArgument,
            ServiceError::Storage(e) => match e {
                StorageError::NotFound(_) => RpcCode::NotFound,
                StorageError::AlreadyExists(_) => RpcCode::AlreadyExists,
                StorageError::Conflict(_) => RpcCode::Aborted,
                StorageError::Unavailable(_) => RpcCode::Unavailable,
                StorageError::Cancelled => RpcCode::Cancelled,
                StorageError::DeadlineExceeded => RpcCode::DeadlineExceeded,
                StorageError::Internal(_) => RpcCode::Internal,
            },
        };
        RpcStatus::new(code, err.to_string())
    }
}

pub struct RpcServer {
    notes: NoteService,
    addr: String,
}

impl RpcServer {
    pub fn new(notes: NoteService, addr: impl Into<String>) -> Self {
        Self { notes, addr: addr.into() }
    }

    /// Bind, log and release the listener. Returns the address that was bound.
    pub async fn start(&self) -> Result<SocketAddr, StartupError> {
        let listener = TcpListener::bind(self.addr.as_str())
            .await
            .map_err(|source| StartupError::Bind { addr: self.addr.clone(), source })?;
        let bound = listener
            .local_addr()
            .map_err(|source| StartupError::Bind { addr: self.addr.clone(), source })?;
        info!(%bound, service = "rpc", event = "listening", "RPC listener bound; no protocol is served");
        drop(listener);
        Ok(bound)
    }

    pub async fn create_note(&self, ctx: &OpContext, title: &str, content: &str) -> Result<Note, RpcStatus> {
        let input = NoteInput { title: title.to_string(), content: content.to_string() };
        Ok(self.notes.create(ctx, input).await?)
    }

    pub async fn get_note(&self, ctx: &OpContext, id: &str) -> Result<Note, RpcStatus> {
        Ok(self.notes.get(ctx, id).await?)
    }

    pub async fn get_all_notes(&self, ctx: &OpContext) -> Result<Vec<Note>, RpcStatus> {
        Ok(self.notes.list(ctx).await?)
    }

    pub async fn update_note(&self, ctx: &OpContext, id: &str, title: &str, content: &str) -> Result<Note, RpcStatus> {
        let input = NoteInput { title: title.to_string(), content: content.to_string() };
        Ok(self.notes.update(ctx, id, input).await?)
    }

    pub async fn delete_note(&self, ctx: &OpContext, id: &str) -> Result<(), RpcStatus> {
        Ok(self.notes.delete(ctx, id).await?)
    }
}
