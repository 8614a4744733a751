use sqlx::{PgPool, Postgres, Transaction};
use time::PrimitiveDateTime;

use crate::db::models::Question;

const COLUMNS: &str = "id, exam_id, text, order_index, created_at";

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY order_index, created_at"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

/// Appends a question after the exam's current last one.
pub(crate) async fn create(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    exam_id: &str,
    text: &str,
    now: PrimitiveDateTime,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (id, exam_id, text, order_index, created_at)
         VALUES (
             $1, $2, $3,
             (SELECT COALESCE(MAX(order_index), 0) + 1 FROM questions WHERE exam_id = $2),
             $4
         )
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(exam_id)
    .bind(text)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
}

pub(crate) async fn delete(
    pool: &PgPool,
    exam_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE exam_id = $1 AND id = $2")
        .bind(exam_id)
        .bind(question_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
