use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Exam;

const COLUMNS: &str = "id, title, created_by, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Every exam, or only those authored by `created_by`.
pub(crate) async fn list(
    pool: &PgPool,
    created_by: Option<&str>,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams
         WHERE ($1::text IS NULL OR created_by = $1)
         ORDER BY created_at DESC"
    ))
    .bind(created_by)
    .fetch_all(pool)
    .await
}

/// Exams with at least one question that the student has not answered yet.
pub(crate) async fn list_not_taken_by(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams e
         WHERE EXISTS (SELECT 1 FROM questions q WHERE q.exam_id = e.id)
           AND NOT EXISTS (
               SELECT 1 FROM student_answers sa
               WHERE sa.exam_id = e.id AND sa.student_id = $1
           )
         ORDER BY e.created_at DESC"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    title: &str,
    created_by: &str,
    now: PrimitiveDateTime,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (id, title, created_by, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $4)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(title)
    .bind(created_by)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn rename(
    pool: &PgPool,
    id: &str,
    title: &str,
    now: PrimitiveDateTime,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams SET title = $1, updated_at = $2 WHERE id = $3 RETURNING {COLUMNS}"
    ))
    .bind(title)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Questions, expected answers and student answers go with it (`ON DELETE CASCADE`).
pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
