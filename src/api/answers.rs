use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::delete,
    Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::repositories;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:answer_id", delete(delete_answer))
}

/// Removes one scored answer, e.g. to let a student retake a question.
async fn delete_answer(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(answer_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let answer = repositories::student_answers::find_scored(state.db(), &answer_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answer"))?
        .ok_or_else(|| ApiError::not_found("Answer"))?;

    repositories::student_answers::delete(state.db(), &answer.answer_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete answer"))?;

    tracing::info!(
        admin_id = %admin.id,
        student_id = %answer.student_id,
        exam_id = %answer.exam_id,
        question_id = %answer.question_id,
        score = answer.score,
        "Scored answer deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
