use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use time::PrimitiveDateTime;

use crate::db::models::{Evaluation, EvaluationWithSheet};
use crate::db::types::JobStatus;
use crate::grading::evaluator::EvaluationResult;

const COLUMNS: &str = "id, batch_id, teacher_id, answer_sheet_id, answer_key_id, status, results,
    total_score, max_score, message, artifact_key, attempts, started_at, completed_at,
    created_at, updated_at";

pub(crate) struct CreateEvaluation<'a> {
    pub(crate) id: &'a str,
    pub(crate) batch_id: &'a str,
    pub(crate) teacher_id: &'a str,
    pub(crate) answer_sheet_id: &'a str,
    pub(crate) answer_key_id: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    tx: &mut Transaction<'_, Postgres>,
    params: CreateEvaluation<'_>,
) -> Result<Evaluation, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(&format!(
        "INSERT INTO evaluations (
            id, batch_id, teacher_id, answer_sheet_id, answer_key_id, status, attempts,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,0,$7,$7)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.batch_id)
    .bind(params.teacher_id)
    .bind(params.answer_sheet_id)
    .bind(params.answer_key_id)
    .bind(JobStatus::Queued)
    .bind(params.created_at)
    .fetch_one(&mut **tx)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(&format!("SELECT {COLUMNS} FROM evaluations WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Runs of one batch; `teacher_id` narrows them to one owner.
pub(crate) async fn list_by_batch(
    pool: &PgPool,
    teacher_id: Option<&str>,
    batch_id: &str,
) -> Result<Vec<EvaluationWithSheet>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationWithSheet>(
        "SELECT ev.id, ev.batch_id, ev.teacher_id, ev.answer_sheet_id, ev.answer_key_id,
                ev.status, ev.results, ev.total_score, ev.max_score, ev.message,
                ev.artifact_key, ev.attempts, ev.started_at, ev.completed_at,
                ev.created_at, ev.updated_at,
                d.filename AS answer_sheet_filename
         FROM evaluations ev
         JOIN documents d ON d.id = ev.answer_sheet_id
         WHERE ($1::text IS NULL OR ev.teacher_id = $1) AND ev.batch_id = $2
         ORDER BY d.filename, ev.created_at",
    )
    .bind(teacher_id)
    .bind(batch_id)
    .fetch_all(pool)
    .await
}

/// Claims the oldest queued evaluation, skipping rows another worker already holds.
pub(crate) async fn claim_next(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Option<Evaluation>, sqlx::Error> {
    sqlx::query_as::<_, Evaluation>(&format!(
        "WITH candidate AS (
            SELECT id
            FROM evaluations
            WHERE status = $1
            ORDER BY attempts, created_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        UPDATE evaluations
        SET status = $2,
            attempts = evaluations.attempts + 1,
            started_at = $3,
            updated_at = $3,
            message = NULL
        FROM candidate
        WHERE evaluations.id = candidate.id
        RETURNING {}",
        prefixed_columns("evaluations")
    ))
    .bind(JobStatus::Queued)
    .bind(JobStatus::Processing)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CompletedEvaluation<'a> {
    pub(crate) results: &'a [EvaluationResult],
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) message: &'a str,
    pub(crate) artifact_key: Option<&'a str>,
    pub(crate) completed_at: PrimitiveDateTime,
}

/// Writes a finished run. Only the claim identified by `attempt` can write it: returns `false`
/// when the row was requeued or reclaimed in the meantime.
pub(crate) async fn mark_completed(
    pool: &PgPool,
    id: &str,
    attempt: i32,
    params: CompletedEvaluation<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE evaluations
         SET status = $1,
             results = $2,
             total_score = $3,
             max_score = $4,
             message = $5,
             artifact_key = $6,
             completed_at = $7,
             updated_at = $7
         WHERE id = $8 AND status = $9 AND attempts = $10",
    )
    .bind(JobStatus::Completed)
    .bind(Json(params.results))
    .bind(params.total_score)
    .bind(params.max_score)
    .bind(params.message)
    .bind(params.artifact_key)
    .bind(params.completed_at)
    .bind(id)
    .bind(JobStatus::Processing)
    .bind(attempt)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn mark_failed(
    pool: &PgPool,
    id: &str,
    attempt: i32,
    message: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE evaluations
         SET status = $1, message = $2, completed_at = $3, updated_at = $3
         WHERE id = $4 AND status = $5 AND attempts = $6",
    )
    .bind(JobStatus::Failed)
    .bind(message)
    .bind(now)
    .bind(id)
    .bind(JobStatus::Processing)
    .bind(attempt)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Puts evaluations stuck in `processing` since before `stale_before` back in the queue, or
/// fails them once `max_attempts` is spent. Returns (requeued, failed).
pub(crate) async fn recover_stale(
    pool: &PgPool,
    stale_before: PrimitiveDateTime,
    max_attempts: i32,
    now: PrimitiveDateTime,
) -> Result<(u64, u64), sqlx::Error> {
    let failed = sqlx::query(
        "UPDATE evaluations
         SET status = $1,
             message = 'Evaluation was interrupted too many times',
             completed_at = $2,
             updated_at = $2
         WHERE status = $3 AND started_at < $4 AND attempts >= $5",
    )
    .bind(JobStatus::Failed)
    .bind(now)
    .bind(JobStatus::Processing)
    .bind(stale_before)
    .bind(max_attempts)
    .execute(pool)
    .await?
    .rows_affected();

    let requeued = sqlx::query(
        "UPDATE evaluations
         SET status = $1, started_at = NULL, updated_at = $2
         WHERE status = $3 AND started_at < $4",
    )
    .bind(JobStatus::Queued)
    .bind(now)
    .bind(JobStatus::Processing)
    .bind(stale_before)
    .execute(pool)
    .await?
    .rows_affected();

    Ok((requeued, failed))
}

fn prefixed_columns(table: &str) -> String {
    COLUMNS
        .split(',')
        .map(|column| format!("{table}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_columns_qualifies_every_column() {
        let columns = prefixed_columns("ev");
        assert!(columns.starts_with("ev.id, ev.batch_id"));
        assert!(columns.ends_with("ev.updated_at"));
        assert_eq!(columns.matches("ev.").count(), COLUMNS.split(',').count());
    }
}
