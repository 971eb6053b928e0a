pub mod errors;
pub mod note;

pub use note::{generate_note_id, validate_note_id, Note, NoteInput, MAX_NOTE_ID_LEN};
