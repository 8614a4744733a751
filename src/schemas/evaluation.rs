use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{Evaluation, EvaluationWithSheet};
use crate::db::types::JobStatus;
use crate::grading::evaluator::{format_score_label, EvaluationResult};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EvaluationCreate {
    /// Defaults to the most recently uploaded answer key.
    #[serde(default)]
    #[serde(alias = "answerKeyId")]
    pub(crate) answer_key_id: Option<String>,
    /// Defaults to every answer sheet of the caller.
    #[serde(default)]
    #[serde(alias = "answerSheetIds")]
    pub(crate) answer_sheet_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationResponse {
    pub(crate) id: String,
    pub(crate) batch_id: String,
    pub(crate) answer_sheet_id: String,
    pub(crate) answer_key_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) answer_sheet: Option<String>,
    pub(crate) status: JobStatus,
    /// `"<total>/<max>"` once completed.
    pub(crate) total_score: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) results: Vec<EvaluationResult>,
    pub(crate) attempts: i32,
    pub(crate) created_at: String,
    pub(crate) completed_at: Option<String>,
}

impl EvaluationResponse {
    pub(crate) fn from_db(evaluation: Evaluation) -> Self {
        let total_score = match (evaluation.total_score, evaluation.max_score) {
            (Some(total), Some(max)) if evaluation.status == JobStatus::Completed => {
                Some(format_score_label(total, max))
            }
            _ => None,
        };

        Self {
            id: evaluation.id,
            batch_id: evaluation.batch_id,
            answer_sheet_id: evaluation.answer_sheet_id,
            answer_key_id: evaluation.answer_key_id,
            answer_sheet: None,
            status: evaluation.status,
            total_score,
            message: evaluation.message,
            results: evaluation.results.map(|results| results.0).unwrap_or_default(),
            attempts: evaluation.attempts,
            created_at: format_primitive(evaluation.created_at),
            completed_at: evaluation.completed_at.map(format_primitive),
        }
    }

    pub(crate) fn with_sheet(row: EvaluationWithSheet) -> Self {
        let mut response = Self::from_db(row.evaluation);
        response.answer_sheet = Some(row.answer_sheet_filename);
        response
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchResponse {
    pub(crate) batch_id: String,
    pub(crate) evaluations: Vec<EvaluationResponse>,
}
