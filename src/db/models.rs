use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{DocumentKind, JobStatus, UserRole};
use crate::grading::evaluator::EvaluationResult;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) text: String,
    pub(crate) order_index: i32,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExpectedAnswer {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) text: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentAnswer {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) exam_id: String,
    pub(crate) question_id: String,
    pub(crate) answer_text: String,
    pub(crate) score: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

/// A scored answer joined with its exam, question and student.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ScoredAnswerRow {
    pub(crate) answer_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) question_id: String,
    pub(crate) question_text: String,
    pub(crate) answer_text: String,
    pub(crate) score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StoredDocument {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) kind: DocumentKind,
    pub(crate) filename: String,
    pub(crate) storage_key: String,
    pub(crate) content_type: String,
    pub(crate) size_bytes: i64,
    pub(crate) sha256: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Evaluation {
    pub(crate) id: String,
    pub(crate) batch_id: String,
    pub(crate) teacher_id: String,
    pub(crate) answer_sheet_id: String,
    pub(crate) answer_key_id: String,
    pub(crate) status: JobStatus,
    pub(crate) results: Option<Json<Vec<EvaluationResult>>>,
    pub(crate) total_score: Option<f64>,
    pub(crate) max_score: Option<f64>,
    pub(crate) message: Option<String>,
    pub(crate) artifact_key: Option<String>,
    pub(crate) attempts: i32,
    pub(crate) started_at: Option<PrimitiveDateTime>,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// An evaluation row with the answer sheet's filename attached.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct EvaluationWithSheet {
    #[sqlx(flatten)]
    pub(crate) evaluation: Evaluation,
    pub(crate) answer_sheet_filename: String,
}
