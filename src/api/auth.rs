use axum::{
    extract::{Form, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::security;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, TokenResponse};
use crate::schemas::user::UserResponse;

const INVALID_CREDENTIALS: &str = "Incorrect username or password";

#[derive(Debug, Deserialize)]
struct OAuth2PasswordForm {
    username: String,
    password: String,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login)).route("/token", post(token)).route("/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    authenticate(&state, "login", &payload.username, &payload.password).await.map(Json)
}

async fn token(
    State(state): State<AppState>,
    Form(payload): Form<OAuth2PasswordForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    authenticate(&state, "token", &payload.username, &payload.password).await.map(Json)
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}

async fn authenticate(
    state: &AppState,
    scope: &str,
    username: &str,
    password: &str,
) -> Result<TokenResponse, ApiError> {
    let username = username.trim();
    let security_settings = state.settings().security();

    let rate_key = format!("rl:{scope}:{}", username.to_lowercase());
    let allowed = state
        .redis()
        .rate_limit(
            &rate_key,
            security_settings.login_rate_limit,
            security_settings.login_rate_window_seconds,
        )
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let user = fetch_user(state, username).await?;

    let verified = security::verify_password(password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized(INVALID_CREDENTIALS))?;
    if !verified {
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    if !user.is_active {
        return Err(ApiError::BadRequest("Inactive user".to_string()));
    }

    let access_token = security::create_access_token(&user.id, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User logged in");

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    })
}

async fn fetch_user(state: &AppState, username: &str) -> Result<User, ApiError> {
    repositories::users::find_by_username(state.db(), username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized(INVALID_CREDENTIALS))
}
