use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::users::{CreateUser, UpdateUser};

const FIRST_ADMIN_FULL_NAME: &str = "Administrator";

/// Makes sure the configured first admin exists, is active and has the configured password.
pub(crate) async fn ensure_first_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_admin_password.is_empty() {
        tracing::warn!("FIRST_ADMIN_PASSWORD not configured; skipping first admin creation");
        return Ok(());
    }

    let username = &admin.first_admin_username;
    let now = primitive_now_utc();

    if let Some(user) = repositories::users::find_by_username(state.db(), username).await? {
        let password_matches =
            security::verify_password(&admin.first_admin_password, &user.hashed_password)
                .unwrap_or(false);

        if password_matches && user.role == UserRole::Admin && user.is_active {
            tracing::info!(username = %username, "First admin already up to date");
            return Ok(());
        }

        let hashed_password = if password_matches {
            None
        } else {
            Some(security::hash_password(&admin.first_admin_password)?)
        };

        repositories::users::update(
            state.db(),
            &user.id,
            UpdateUser {
                full_name: None,
                role: Some(UserRole::Admin),
                is_active: Some(true),
                hashed_password,
                updated_at: now,
            },
        )
        .await?;

        tracing::info!(username = %username, "Updated first admin");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_admin_password)?;
    let id = Uuid::new_v4().to_string();
    repositories::users::create(
        state.db(),
        CreateUser {
            id: &id,
            username,
            hashed_password,
            full_name: FIRST_ADMIN_FULL_NAME,
            role: UserRole::Admin,
            is_active: true,
            created_at: now,
        },
    )
    .await?;

    tracing::info!(username = %username, "Created first admin");
    Ok(())
}
