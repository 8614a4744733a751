use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::{self, PaginatedResponse};
use crate::api::validation::{validate_password_len, validate_username};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::score::{group_scores, ExamScoreGroup};
use crate::schemas::user::{UserCreate, UserListQuery, UserResponse, UserUpdate};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:user_id", get(get_user).patch(update_user).delete(delete_user))
        .route("/:user_id/scores", get(user_scores))
}

async fn list_users(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Query(params): Query<UserListQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let (skip, limit) = pagination::clamp(params.skip, params.limit);

    let users = repositories::users::list(state.db(), params.role, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;
    let total_count = repositories::users::count(state.db(), params.role)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;

    Ok(Json(PaginatedResponse {
        items: users.into_iter().map(UserResponse::from_db).collect(),
        total_count,
        skip,
        limit,
    }))
}

async fn create_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let username = payload.username.trim();
    validate_username(username)?;
    validate_password_len(&payload.password)?;

    let exists = repositories::users::exists_by_username(state.db(), username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if exists {
        return Err(ApiError::Conflict("User with this username already exists".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            hashed_password,
            full_name: payload.full_name.trim(),
            role: payload.role,
            is_active: payload.is_active,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create user"))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user.id,
        role = ?user.role,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from_db(user))))
}

async fn get_user(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = fetch_user(&state, &user_id).await?;
    Ok(Json(UserResponse::from_db(user)))
}

async fn update_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<String>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    if user_id == admin.id && payload.is_active == Some(false) {
        return Err(ApiError::BadRequest("You cannot deactivate your own account".to_string()));
    }

    let full_name = match payload.full_name.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::BadRequest("full_name must not be empty".to_string())),
        other => other.map(str::to_string),
    };

    let hashed_password = match payload.password.as_deref() {
        Some(password) => {
            validate_password_len(password)?;
            Some(
                security::hash_password(password)
                    .map_err(|e| ApiError::internal(e, "Failed to hash password"))?,
            )
        }
        None => None,
    };

    let user = repositories::users::update(
        state.db(),
        &user_id,
        repositories::users::UpdateUser {
            full_name,
            role: None,
            is_active: payload.is_active,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update user"))?
    .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(UserResponse::from_db(user)))
}

async fn delete_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    let deleted = repositories::users::delete(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete user"))?;
    if !deleted {
        return Err(ApiError::not_found("User"));
    }

    tracing::info!(admin_id = %admin.id, user_id = %user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn user_scores(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ExamScoreGroup>>, ApiError> {
    let user = fetch_user(&state, &user_id).await?;
    if user.role != UserRole::Student {
        return Err(ApiError::BadRequest("Scores are only recorded for students".to_string()));
    }

    let rows = repositories::student_answers::list_scored(state.db(), Some(&user.id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load scores"))?;
    Ok(Json(group_scores(rows)))
}

async fn fetch_user(state: &AppState, user_id: &str) -> Result<User, ApiError> {
    repositories::users::find_by_id(state.db(), user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or_else(|| ApiError::not_found("User"))
}

#[cfg(test)]
mod tests;
