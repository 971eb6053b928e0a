use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(ToSchema)]
pub struct NoteDoc {
    #[schema(example = "20240102030405-123456")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[schema(example = "2024-01-02T03:04:05.123456Z")]
    pub created_at: String,
    pub updated_at: String,
}

#[derive(ToSchema)]
pub struct CreateNoteDoc {
    /// Optional caller-chosen id; generated from the current time when absent.
    pub id: Option<String>,
    pub title: String,
    pub content: String,
}

#[derive(ToSchema)]
pub struct NoteInputDoc {
    pub title: String,
    pub content: String,
}

#[derive(ToSchema)]
pub struct ErrorDoc {
    pub error: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::notes::list,
        crate::routes::notes::create,
        crate::routes::notes::get,
        crate::routes::notes::update,
        crate::routes::notes::delete,
    ),
    components(schemas(HealthResponse, NoteDoc, CreateNoteDoc, NoteInputDoc, ErrorDoc)),
    tags((name = "health"), (name = "notes"))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_note_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/notes"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/notes/{id}"));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
    }
}
