use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::StoredDocument;
use crate::db::types::DocumentKind;

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentListQuery {
    #[serde(default)]
    pub(crate) kind: Option<DocumentKind>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DocumentResponse {
    pub(crate) id: String,
    pub(crate) kind: DocumentKind,
    pub(crate) filename: String,
    pub(crate) content_type: String,
    pub(crate) size_bytes: i64,
    pub(crate) sha256: String,
    pub(crate) created_at: String,
}

impl DocumentResponse {
    pub(crate) fn from_db(document: StoredDocument) -> Self {
        Self {
            id: document.id,
            kind: document.kind,
            filename: document.filename,
            content_type: document.content_type,
            size_bytes: document.size_bytes,
            sha256: document.sha256,
            created_at: format_primitive(document.created_at),
        }
    }
}
