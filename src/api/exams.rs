use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_exam_owner, CurrentTeacher};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::ExpectedAnswer;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::exam::{
    ExamCreate, ExamListQuery, ExamResponse, ExamUpdate, QuestionCreate, QuestionResponse,
};
use crate::schemas::score::{group_scores, ExamScoreGroup};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/scores", get(all_scores))
        .route("/:exam_id", patch(rename_exam).delete(delete_exam))
        .route("/:exam_id/questions", get(list_questions).post(add_question))
        .route("/:exam_id/questions/:question_id", delete(delete_question))
        .route("/:exam_id/scores", get(exam_scores))
}

async fn list_exams(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Query(params): Query<ExamListQuery>,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let author = match user.role {
        UserRole::Admin => params.teacher_id,
        _ => Some(user.id),
    };

    let exams = repositories::exams::list(state.db(), author.as_deref())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;
    Ok(Json(exams.into_iter().map(ExamResponse::from_db).collect()))
}

async fn create_exam(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let title = non_blank(&payload.title, "title")?;

    let exam = repositories::exams::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        title,
        &user.id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    tracing::info!(exam_id = %exam.id, teacher_id = %user.id, "Exam created");
    Ok((StatusCode::CREATED, Json(ExamResponse::from_db(exam))))
}

async fn rename_exam(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Path(exam_id): Path<String>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let title = non_blank(&payload.title, "title")?;
    require_exam_owner(&state, &user, &exam_id).await?;

    let exam = repositories::exams::rename(state.db(), &exam_id, title, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to rename exam"))?
        .ok_or_else(|| ApiError::not_found("Exam"))?;

    Ok(Json(ExamResponse::from_db(exam)))
}

async fn delete_exam(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Path(exam_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_exam_owner(&state, &user, &exam_id).await?;

    let deleted = repositories::exams::delete(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;
    if !deleted {
        return Err(ApiError::not_found("Exam"));
    }

    tracing::info!(exam_id = %exam_id, user_id = %user.id, "Exam deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_questions(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    require_exam_owner(&state, &user, &exam_id).await?;

    let questions = repositories::questions::list_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let answers = repositories::expected_answers::list_by_question_ids(state.db(), &question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load expected answers"))?;

    let mut by_question = group_by_question(answers);
    let response = questions
        .into_iter()
        .map(|question| {
            let answers = by_question.remove(&question.id).unwrap_or_default();
            QuestionResponse::from_db(question, answers)
        })
        .collect();

    Ok(Json(response))
}

async fn add_question(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Path(exam_id): Path<String>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let text = non_blank(&payload.text, "question text")?;
    let expected: Vec<&str> = payload
        .expected_answers
        .iter()
        .map(|answer| answer.trim())
        .filter(|answer| !answer.is_empty())
        .collect();
    if expected.is_empty() {
        return Err(ApiError::BadRequest("At least one expected answer is required".to_string()));
    }

    require_exam_owner(&state, &user, &exam_id).await?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question_id = Uuid::new_v4().to_string();
    let question = repositories::questions::create(&mut tx, &question_id, &exam_id, text, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    let mut answers = Vec::with_capacity(expected.len());
    for answer in expected {
        let created = repositories::expected_answers::create(
            &mut tx,
            &Uuid::new_v4().to_string(),
            &question.id,
            answer,
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create expected answer"))?;
        answers.push(created);
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit question"))?;

    Ok((StatusCode::CREATED, Json(QuestionResponse::from_db(question, answers))))
}

async fn delete_question(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Path((exam_id, question_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    require_exam_owner(&state, &user, &exam_id).await?;

    let deleted = repositories::questions::delete(state.db(), &exam_id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;
    if !deleted {
        return Err(ApiError::not_found("Question"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Every student's scores on one exam.
async fn exam_scores(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<ExamScoreGroup>>, ApiError> {
    let exam = require_exam_owner(&state, &user, &exam_id).await?;

    let rows = repositories::student_answers::list_scored_for_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load scores"))?;
    Ok(Json(group_scores(rows)))
}

/// Scores across every exam the caller authored; admins see all exams.
async fn all_scores(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
) -> Result<Json<Vec<ExamScoreGroup>>, ApiError> {
    let rows = match user.role {
        UserRole::Admin => repositories::student_answers::list_scored(state.db(), None).await,
        _ => repositories::student_answers::list_scored_for_author(state.db(), &user.id).await,
    }
    .map_err(|e| ApiError::internal(e, "Failed to load scores"))?;
    Ok(Json(group_scores(rows)))
}

fn group_by_question(answers: Vec<ExpectedAnswer>) -> HashMap<String, Vec<ExpectedAnswer>> {
    let mut grouped: HashMap<String, Vec<ExpectedAnswer>> = HashMap::new();
    for answer in answers {
        grouped.entry(answer.question_id.clone()).or_default().push(answer);
    }
    grouped
}

fn non_blank<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::BadRequest(format!("{field} must not be empty")))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests;
