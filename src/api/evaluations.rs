use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentTeacher;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{StoredDocument, User};
use crate::db::types::{DocumentKind, UserRole};
use crate::repositories;
use crate::repositories::evaluations::CreateEvaluation;
use crate::schemas::evaluation::{BatchResponse, EvaluationCreate, EvaluationResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_batch))
        .route("/:evaluation_id", get(get_evaluation))
        .route("/batches/:batch_id", get(get_batch))
}

/// Queues one evaluation per answer sheet under a fresh batch id.
async fn create_batch(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    payload: Option<Json<EvaluationCreate>>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let Json(payload) = payload.unwrap_or_default();

    let answer_key = resolve_answer_key(&state, &user, payload.answer_key_id.as_deref()).await?;
    let sheets = resolve_answer_sheets(&state, &user, payload.answer_sheet_ids).await?;

    let batch_id = Uuid::new_v4().to_string();
    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let mut evaluations = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        let evaluation = repositories::evaluations::create(
            &mut tx,
            CreateEvaluation {
                id: &Uuid::new_v4().to_string(),
                batch_id: &batch_id,
                teacher_id: &user.id,
                answer_sheet_id: &sheet.id,
                answer_key_id: &answer_key.id,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to queue evaluation"))?;

        let mut response = EvaluationResponse::from_db(evaluation);
        response.answer_sheet = Some(sheet.filename);
        evaluations.push(response);
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit evaluations"))?;

    metrics::counter!("evaluation_jobs_total", "event" => "queued")
        .increment(evaluations.len() as u64);
    tracing::info!(
        teacher_id = %user.id,
        batch_id = %batch_id,
        answer_key_id = %answer_key.id,
        sheets = evaluations.len(),
        "Evaluation batch queued"
    );

    Ok((StatusCode::ACCEPTED, Json(BatchResponse { batch_id, evaluations })))
}

async fn get_evaluation(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Path(evaluation_id): Path<String>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let evaluation = repositories::evaluations::find_by_id(state.db(), &evaluation_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load evaluation"))?
        .ok_or_else(|| ApiError::not_found("Evaluation"))?;

    if user.role != UserRole::Admin && evaluation.teacher_id != user.id {
        return Err(ApiError::not_found("Evaluation"));
    }

    Ok(Json(EvaluationResponse::from_db(evaluation)))
}

async fn get_batch(
    State(state): State<AppState>,
    CurrentTeacher(user): CurrentTeacher,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchResponse>, ApiError> {
    let owner = (user.role != UserRole::Admin).then_some(user.id.as_str());
    let rows = repositories::evaluations::list_by_batch(state.db(), owner, &batch_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load evaluation batch"))?;
    if rows.is_empty() {
        return Err(ApiError::not_found("Evaluation batch"));
    }

    Ok(Json(BatchResponse {
        batch_id,
        evaluations: rows.into_iter().map(EvaluationResponse::with_sheet).collect(),
    }))
}

async fn resolve_answer_key(
    state: &AppState,
    user: &User,
    answer_key_id: Option<&str>,
) -> Result<StoredDocument, ApiError> {
    let found = match answer_key_id {
        Some(id) => {
            repositories::documents::find_owned(state.db(), &user.id, id, DocumentKind::AnswerKey)
                .await
        }
        None => repositories::documents::latest_answer_key(state.db(), &user.id).await,
    }
    .map_err(|e| ApiError::internal(e, "Failed to load answer key"))?;

    found.ok_or_else(|| {
        ApiError::BadRequest("No answer key found. Please upload an answer key first.".to_string())
    })
}

async fn resolve_answer_sheets(
    state: &AppState,
    user: &User,
    answer_sheet_ids: Option<Vec<String>>,
) -> Result<Vec<StoredDocument>, ApiError> {
    let sheets = match answer_sheet_ids {
        Some(ids) => {
            let mut sheets = Vec::with_capacity(ids.len());
            for id in ids {
                let sheet = repositories::documents::find_owned(
                    state.db(),
                    &user.id,
                    &id,
                    DocumentKind::AnswerSheet,
                )
                .await
                .map_err(|e| ApiError::internal(e, "Failed to load answer sheet"))?
                .ok_or_else(|| ApiError::BadRequest(format!("Answer sheet {id} not found")))?;
                if !sheets.iter().any(|existing: &StoredDocument| existing.id == sheet.id) {
                    sheets.push(sheet);
                }
            }
            sheets
        }
        None => repositories::documents::list_by_owner(
            state.db(),
            &user.id,
            Some(DocumentKind::AnswerSheet),
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list answer sheets"))?,
    };

    if sheets.is_empty() {
        return Err(ApiError::BadRequest(
            "No answer sheets found. Please upload answer sheets first.".to_string(),
        ));
    }
    Ok(sheets)
}
