use sqlx::{PgPool, Postgres, Transaction};
use time::PrimitiveDateTime;

use crate::db::models::{ScoredAnswerRow, StudentAnswer};

const COLUMNS: &str = "id, student_id, exam_id, question_id, answer_text, score, created_at";

const SCORED_SELECT: &str = "SELECT sa.id AS answer_id,
        sa.student_id,
        u.full_name AS student_name,
        sa.exam_id,
        e.title AS exam_title,
        sa.question_id,
        q.text AS question_text,
        sa.answer_text,
        sa.score
    FROM student_answers sa
    JOIN users u ON u.id = sa.student_id
    JOIN exams e ON e.id = sa.exam_id
    JOIN questions q ON q.id = sa.question_id";

pub(crate) struct CreateStudentAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) answer_text: &'a str,
    pub(crate) score: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn exists_for_exam(
    pool: &PgPool,
    student_id: &str,
    exam_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM student_answers WHERE student_id = $1 AND exam_id = $2)",
    )
    .bind(student_id)
    .bind(exam_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn create(
    tx: &mut Transaction<'_, Postgres>,
    params: CreateStudentAnswer<'_>,
) -> Result<StudentAnswer, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "INSERT INTO student_answers (
            id, student_id, exam_id, question_id, answer_text, score, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.exam_id)
    .bind(params.question_id)
    .bind(params.answer_text)
    .bind(params.score)
    .bind(params.created_at)
    .fetch_one(&mut **tx)
    .await
}

/// All scored answers, optionally narrowed to one student, ordered for grouping by exam.
pub(crate) async fn list_scored(
    pool: &PgPool,
    student_id: Option<&str>,
) -> Result<Vec<ScoredAnswerRow>, sqlx::Error> {
    sqlx::query_as::<_, ScoredAnswerRow>(&format!(
        "{SCORED_SELECT}
         WHERE ($1::text IS NULL OR sa.student_id = $1)
         ORDER BY e.created_at DESC, e.id, u.full_name, sa.student_id, q.order_index"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

/// Scored answers for exams authored by `teacher_id`.
pub(crate) async fn list_scored_for_author(
    pool: &PgPool,
    teacher_id: &str,
) -> Result<Vec<ScoredAnswerRow>, sqlx::Error> {
    sqlx::query_as::<_, ScoredAnswerRow>(&format!(
        "{SCORED_SELECT}
         WHERE e.created_by = $1
         ORDER BY e.created_at DESC, e.id, u.full_name, sa.student_id, q.order_index"
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_scored_for_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<ScoredAnswerRow>, sqlx::Error> {
    sqlx::query_as::<_, ScoredAnswerRow>(&format!(
        "{SCORED_SELECT}
         WHERE sa.exam_id = $1
         ORDER BY u.full_name, sa.student_id, q.order_index"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_scored(
    pool: &PgPool,
    answer_id: &str,
) -> Result<Option<ScoredAnswerRow>, sqlx::Error> {
    sqlx::query_as::<_, ScoredAnswerRow>(&format!("{SCORED_SELECT} WHERE sa.id = $1"))
        .bind(answer_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn delete(pool: &PgPool, answer_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM student_answers WHERE id = $1")
        .bind(answer_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
