use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use models::{validate_note_id, Note, NoteInput};
use serde::Deserialize;
use tracing::info;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Rejects malformed `:id` path segments with 400 before any handler runs.
pub async fn require_valid_id(Path(id): Path<String>, req: Request, next: Next) -> Response {
    if let Err(e) = validate_note_id(&id) {
        return ApiError::bad_request(e.to_string()).into_response();
    }
    next.run(req).await
}

pub async fn missing_id() -> ApiError {
    ApiError::bad_request("note id is required")
}

#[utoipa::path(
    get, path = "/api/notes", tag = "notes",
    responses(
        (status = 200, description = "All notes", body = [crate::openapi::NoteDoc]),
        (status = 500, description = "Storage failure", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = state.notes.list(&state.op_context()).await?;
    Ok(Json(notes))
}

#[utoipa::path(
    post, path = "/api/notes", tag = "notes",
    request_body = crate::openapi::CreateNoteDoc,
    responses(
        (status = 201, description = "Created", body = crate::openapi::NoteDoc),
        (status = 400, description = "Invalid body, invalid id or duplicate id", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Storage failure", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let Json(req) = payload?;
    let ctx = state.op_context();
    let input = NoteInput { title: req.title, content: req.content };
    let note = match req.id.as_deref() {
        Some(id) => state.notes.create_with_id(&ctx, id, input).await?,
        None => state.notes.create(&ctx, input).await?,
    };
    info!(note_id = %note.id, event = "note_create", "created note via REST");
    Ok((StatusCode::CREATED, Json(note)))
}

#[utoipa::path(
    get, path = "/api/notes/{id}", tag = "notes",
    params(("id" = String, Path, description = "Note id: letters, digits, '-' and '_'")),
    responses(
        (status = 200, description = "The note", body = crate::openapi::NoteDoc),
        (status = 400, description = "Invalid id", body = crate::openapi::ErrorDoc),
        (status = 404, description = "Not found", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Note>, ApiError> {
    let note = state.notes.get(&state.op_context(), &id).await?;
    Ok(Json(note))
}

#[utoipa::path(
    put, path = "/api/notes/{id}", tag = "notes",
    params(("id" = String, Path, description = "Note id")),
    request_body = crate::openapi::NoteInputDoc,
    responses(
        (status = 200, description = "Updated note", body = crate::openapi::NoteDoc),
        (status = 400, description = "Invalid id or body", body = crate::openapi::ErrorDoc),
        (status = 404, description = "Not found", body = crate::openapi::ErrorDoc),
        (status = 500, description = "Storage failure or concurrent write", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<NoteInput>, JsonRejection>,
) -> Result<Json<Note>, ApiError> {
    let Json(input) = payload?;
    let note = state.notes.update(&state.op_context(), &id, input).await?;
    Ok(Json(note))
}

#[utoipa::path(
    delete, path = "/api/notes/{id}", tag = "notes",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Invalid id", body = crate::openapi::ErrorDoc),
        (status = 404, description = "Not found", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.notes.delete(&state.op_context(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
