use sqlx::{PgPool, Postgres, Transaction};
use time::PrimitiveDateTime;

use crate::db::models::ExpectedAnswer;

const COLUMNS: &str = "id, question_id, text, created_at";

pub(crate) async fn list_by_question_ids(
    pool: &PgPool,
    question_ids: &[String],
) -> Result<Vec<ExpectedAnswer>, sqlx::Error> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, ExpectedAnswer>(&format!(
        "SELECT {COLUMNS} FROM expected_answers
         WHERE question_id = ANY($1)
         ORDER BY question_id, created_at"
    ))
    .bind(question_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(
    tx: &mut Transaction<'_, Postgres>,
    id: &str,
    question_id: &str,
    text: &str,
    now: PrimitiveDateTime,
) -> Result<ExpectedAnswer, sqlx::Error> {
    sqlx::query_as::<_, ExpectedAnswer>(&format!(
        "INSERT INTO expected_answers (id, question_id, text, created_at)
         VALUES ($1, $2, $3, $4)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(question_id)
    .bind(text)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
}
