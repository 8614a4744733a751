use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::{Exam, User};
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);
/// A teacher or an admin.
pub(crate) struct CurrentTeacher(pub(crate) User);
pub(crate) struct CurrentStudent(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?
            .ok_or(ApiError::Unauthorized("User not found"))?;

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

macro_rules! role_guard {
    ($guard:ident, $allowed:expr, $denied:literal) => {
        #[async_trait]
        impl FromRequestParts<AppState> for $guard {
            type Rejection = ApiError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
                let allowed: fn(UserRole) -> bool = $allowed;
                if allowed(user.role) {
                    Ok($guard(user))
                } else {
                    Err(ApiError::Forbidden($denied))
                }
            }
        }
    };
}

role_guard!(CurrentAdmin, |role| role == UserRole::Admin, "Admin access required");
role_guard!(CurrentTeacher, UserRole::can_author, "Teacher access required");
role_guard!(CurrentStudent, |role| role == UserRole::Student, "Student access required");

/// Loads an exam the user may manage: admins see every exam, teachers only their own.
pub(crate) async fn require_exam_owner(
    state: &AppState,
    user: &User,
    exam_id: &str,
) -> Result<Exam, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::not_found("Exam"))?;

    if user.role == UserRole::Admin || exam.created_by == user.id {
        Ok(exam)
    } else {
        Err(ApiError::Forbidden("Not enough permissions for this exam"))
    }
}
