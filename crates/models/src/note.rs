use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

pub const MAX_NOTE_ID_LEN: usize = 255;

/// A note as seen by callers. Backend bookkeeping (revision tokens, `_id`
/// field names) never appears here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable part of a note, as accepted from clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl Note {
    /// New note with a timestamp-derived identifier.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_id(generate_note_id(), title, content)
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, input: NoteInput) {
        self.title = input.title;
        self.content = input.content;
    }

    /// Refresh `updated_at`, never letting it fall behind `created_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }
}

/// `YYYYMMDDhhmmss-ffffff` in UTC. Two calls within the same microsecond
/// return the same value.
pub fn generate_note_id() -> String {
    Utc::now().format("%Y%m%d%H%M%S-%6f").to_string()
}

/// Identifiers are 1..=255 characters of ASCII letters, digits, `-` and `_`.
pub fn validate_note_id(id: &str) -> Result<(), ModelError> {
    if id.is_empty() {
        return Err(ModelError::Validation("note id is required".into()));
    }
    if id.len() > MAX_NOTE_ID_LEN {
        return Err(ModelError::Validation(format!(
            "note id longer than {MAX_NOTE_ID_LEN} characters"
        )));
    }
    if !id.chars().all(is_valid_id_char) {
        return Err(ModelError::Validation("invalid note id format".into()));
    }
    Ok(())
}

fn is_valid_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
