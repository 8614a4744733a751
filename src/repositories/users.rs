use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::User;
use crate::db::types::UserRole;

const COLUMNS: &str =
    "id, username, hashed_password, full_name, role, is_active, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_username(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(pool)
        .await
}

pub(crate) async fn list(
    pool: &PgPool,
    role: Option<UserRole>,
    skip: i64,
    limit: i64,
) -> Result<Vec<User>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM users"));
    if let Some(role) = role {
        builder.push(" WHERE role = ").push_bind(role);
    }
    builder.push(" ORDER BY created_at DESC OFFSET ").push_bind(skip);
    builder.push(" LIMIT ").push_bind(limit);

    builder.build_query_as::<User>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, role: Option<UserRole>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE ($1::userrole IS NULL OR role = $1)",
    )
    .bind(role)
    .fetch_one(pool)
    .await
}

pub(crate) struct CreateUser<'a> {
    pub(crate) id: &'a str,
    pub(crate) username: &'a str,
    pub(crate) hashed_password: String,
    pub(crate) full_name: &'a str,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, username, hashed_password, full_name, role, is_active, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.username)
    .bind(params.hashed_password)
    .bind(params.full_name)
    .bind(params.role)
    .bind(params.is_active)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct UpdateUser {
    pub(crate) full_name: Option<String>,
    pub(crate) role: Option<UserRole>,
    pub(crate) is_active: Option<bool>,
    pub(crate) hashed_password: Option<String>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateUser,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            full_name = COALESCE($1, full_name),
            role = COALESCE($2, role),
            is_active = COALESCE($3, is_active),
            hashed_password = COALESCE($4, hashed_password),
            updated_at = $5
         WHERE id = $6
         RETURNING {COLUMNS}",
    ))
    .bind(params.full_name)
    .bind(params.role)
    .bind(params.is_active)
    .bind(params.hashed_password)
    .bind(params.updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
