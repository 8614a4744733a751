use axum::{
    extract::{multipart::Field, Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTeacher;
use crate::api::validation::{sanitize_filename, validate_upload};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{StoredDocument, User};
use crate::db::types::DocumentKind;
use crate::repositories;
use crate::repositories::documents::CreateDocument;
use crate::schemas::document::{DocumentListQuery, DocumentResponse};
use crate::services::storage::{self, StorageService};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents))
        .route("/answer-sheets", post(upload_answer_sheets))
        .route("/answer-key", post(upload_answer_key))
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

async fn list_documents(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Query(params): Query<DocumentListQuery>,
) -> Result<Json<Vec<DocumentResponse>>, ApiError> {
    let documents = repositories::documents::list_by_owner(state.db(), &user.id, params.kind)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list documents"))?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from_db).collect()))
}

/// Accepts any number of answer sheets in one request.
async fn upload_answer_sheets(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<DocumentResponse>>), ApiError> {
    let storage = require_storage(&state)?;
    let files = read_files(&state, multipart).await?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("At least one answer sheet is required".to_string()));
    }

    let allowed = &state.settings().storage().answer_sheet_extensions;
    let max_bytes = state.settings().storage().max_upload_bytes();
    let mut validated = Vec::with_capacity(files.len());
    for file in files {
        let extension = validate_upload(&file.filename, file.bytes.len(), allowed, max_bytes)?;
        validated.push((file, extension));
    }

    let mut stored = Vec::with_capacity(validated.len());
    for (file, extension) in validated {
        let document =
            store(&state, storage, &user, DocumentKind::AnswerSheet, file, &extension).await?;
        stored.push(DocumentResponse::from_db(document));
    }

    tracing::info!(teacher_id = %user.id, count = stored.len(), "Answer sheets uploaded");
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn upload_answer_key(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let storage = require_storage(&state)?;
    let mut files = read_files(&state, multipart).await?;
    if files.len() != 1 {
        return Err(ApiError::BadRequest("Exactly one answer key file is required".to_string()));
    }
    let file = files.remove(0);

    let extension = validate_upload(
        &file.filename,
        file.bytes.len(),
        &state.settings().storage().answer_key_extensions,
        state.settings().storage().max_upload_bytes(),
    )?;

    let document = store(&state, storage, &user, DocumentKind::AnswerKey, file, &extension).await?;

    tracing::info!(teacher_id = %user.id, document_id = %document.id, "Answer key uploaded");
    Ok((StatusCode::CREATED, Json(DocumentResponse::from_db(document))))
}

fn require_storage(state: &AppState) -> Result<&StorageService, ApiError> {
    state.storage().ok_or_else(|| {
        ApiError::ServiceUnavailable("File storage is not configured".to_string())
    })
}

async fn read_files(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<Vec<UploadedFile>, ApiError> {
    let max_bytes = state.settings().storage().max_upload_bytes();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let Some(filename) = field.file_name().map(sanitize_filename) else {
            continue;
        };
        let bytes = read_field(field, &filename, max_bytes).await?;
        files.push(UploadedFile { filename, bytes });
    }

    Ok(files)
}

async fn read_field(
    mut field: Field<'_>,
    filename: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|_| ApiError::BadRequest(format!("Failed to read '{filename}'")))?
    {
        if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "File '{filename}' exceeds the {} MB upload limit",
                max_bytes / (1024 * 1024)
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn store(
    state: &AppState,
    storage: &StorageService,
    user: &User,
    kind: DocumentKind,
    file: UploadedFile,
    extension: &str,
) -> Result<StoredDocument, ApiError> {
    let id = Uuid::new_v4().to_string();
    let key = storage::document_key(kind, &user.id, &id, extension);
    let content_type = storage::content_type_for(extension);

    let object = storage
        .upload_bytes(&key, content_type, file.bytes)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to upload file"))?;

    let created = repositories::documents::create(
        state.db(),
        CreateDocument {
            id: &id,
            owner_id: &user.id,
            kind,
            filename: &file.filename,
            storage_key: &key,
            content_type,
            size_bytes: object.size_bytes,
            sha256: &object.sha256,
            created_at: primitive_now_utc(),
        },
    )
    .await;

    match created {
        Ok(document) => Ok(document),
        Err(err) => {
            if let Err(cleanup) = storage.delete(&key).await {
                tracing::warn!(key = %key, error = %format!("{cleanup:#}"), "Orphaned upload");
            }
            Err(ApiError::internal(err, "Failed to store document metadata"))
        }
    }
}
