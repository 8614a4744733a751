use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::StoredDocument;
use crate::db::types::DocumentKind;

const COLUMNS: &str =
    "id, owner_id, kind, filename, storage_key, content_type, size_bytes, sha256, created_at";

pub(crate) struct CreateDocument<'a> {
    pub(crate) id: &'a str,
    pub(crate) owner_id: &'a str,
    pub(crate) kind: DocumentKind,
    pub(crate) filename: &'a str,
    pub(crate) storage_key: &'a str,
    pub(crate) content_type: &'a str,
    pub(crate) size_bytes: i64,
    pub(crate) sha256: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateDocument<'_>,
) -> Result<StoredDocument, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(&format!(
        "INSERT INTO documents (
            id, owner_id, kind, filename, storage_key, content_type, size_bytes, sha256,
            created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.owner_id)
    .bind(params.kind)
    .bind(params.filename)
    .bind(params.storage_key)
    .bind(params.content_type)
    .bind(params.size_bytes)
    .bind(params.sha256)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(&format!("SELECT {COLUMNS} FROM documents WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_owned(
    pool: &PgPool,
    owner_id: &str,
    id: &str,
    kind: DocumentKind,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(&format!(
        "SELECT {COLUMNS} FROM documents WHERE owner_id = $1 AND id = $2 AND kind = $3"
    ))
    .bind(owner_id)
    .bind(id)
    .bind(kind)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_owner(
    pool: &PgPool,
    owner_id: &str,
    kind: Option<DocumentKind>,
) -> Result<Vec<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(&format!(
        "SELECT {COLUMNS} FROM documents
         WHERE owner_id = $1 AND ($2::documentkind IS NULL OR kind = $2)
         ORDER BY created_at DESC"
    ))
    .bind(owner_id)
    .bind(kind)
    .fetch_all(pool)
    .await
}

/// The most recently uploaded answer key of a teacher.
pub(crate) async fn latest_answer_key(
    pool: &PgPool,
    owner_id: &str,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(&format!(
        "SELECT {COLUMNS} FROM documents
         WHERE owner_id = $1 AND kind = $2
         ORDER BY created_at DESC, id DESC
         LIMIT 1"
    ))
    .bind(owner_id)
    .bind(DocumentKind::AnswerKey)
    .fetch_optional(pool)
    .await
}
