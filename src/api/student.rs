use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Exam, Question};
use crate::grading::aggregate::MAX_SCORE;
use crate::repositories;
use crate::repositories::student_answers::CreateStudentAnswer;
use crate::schemas::exam::{
    ExamResponse, ExamSubmission, StudentExamResponse, StudentQuestionResponse,
};
use crate::schemas::score::{group_scores, ExamScoreGroup, ScoredAnswerResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/exams", get(available_exams))
        .route("/exams/:exam_id", get(exam_detail))
        .route("/exams/:exam_id/answers", post(submit_answers))
        .route("/scores", get(my_scores))
}

/// Exams the student has not taken yet.
async fn available_exams(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = repositories::exams::list_not_taken_by(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;
    Ok(Json(exams.into_iter().map(ExamResponse::from_db).collect()))
}

async fn exam_detail(
    State(state): State<AppState>,
    CurrentStudent(_student): CurrentStudent,
    Path(exam_id): Path<String>,
) -> Result<Json<StudentExamResponse>, ApiError> {
    let (exam, questions) = load_exam(&state, &exam_id).await?;

    Ok(Json(StudentExamResponse {
        id: exam.id,
        title: exam.title,
        questions: questions.into_iter().map(StudentQuestionResponse::from_db).collect(),
    }))
}

/// Scores and stores a whole exam at once. Questions missing from the submission are recorded
/// as unanswered with a score of 0.
async fn submit_answers(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(exam_id): Path<String>,
    Json(payload): Json<ExamSubmission>,
) -> Result<(StatusCode, Json<ExamScoreGroup>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let (exam, questions) = load_exam(&state, &exam_id).await?;

    let already_taken =
        repositories::student_answers::exists_for_exam(state.db(), &student.id, &exam.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check previous submission"))?;
    if already_taken {
        return Err(ApiError::Conflict("You have already taken this exam".to_string()));
    }

    let answers = collect_answers(&questions, &payload)?;

    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let expected = repositories::expected_answers::list_by_question_ids(state.db(), &question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load expected answers"))?;
    let mut expected_by_question: HashMap<&str, Vec<&str>> = HashMap::new();
    for answer in &expected {
        expected_by_question.entry(answer.question_id.as_str()).or_default().push(&answer.text);
    }

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let mut scored = Vec::with_capacity(questions.len());
    for question in &questions {
        let answer_text = answers.get(question.id.as_str()).copied().unwrap_or_default();
        let candidates = expected_by_question.get(question.id.as_str());
        let score = state
            .scorer()
            .score_best(candidates.into_iter().flatten().copied(), answer_text)
            .map(|outcome| outcome.score)
            .unwrap_or(0.0);

        let answer_id = Uuid::new_v4().to_string();
        let inserted = repositories::student_answers::create(
            &mut tx,
            CreateStudentAnswer {
                id: &answer_id,
                student_id: &student.id,
                exam_id: &exam.id,
                question_id: &question.id,
                answer_text,
                score,
                created_at: now,
            },
        )
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(ApiError::Conflict("You have already taken this exam".to_string()));
            }
            Err(err) => return Err(ApiError::internal(err, "Failed to store answer")),
        }

        scored.push(ScoredAnswerResponse {
            answer_id,
            question_id: question.id.clone(),
            question: question.text.clone(),
            answer: answer_text.to_string(),
            score,
        });
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit answers"))?;

    let total_score: f64 = scored.iter().map(|answer| answer.score).sum();
    let max_score = scored.len() as f64 * MAX_SCORE;

    tracing::info!(
        student_id = %student.id,
        exam_id = %exam.id,
        total_score,
        max_score,
        "Exam submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(ExamScoreGroup {
            exam_id: exam.id,
            exam_title: exam.title,
            student_id: student.id,
            student_name: student.full_name,
            answers: scored,
            total_score,
            max_score,
        }),
    ))
}

async fn my_scores(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
) -> Result<Json<Vec<ExamScoreGroup>>, ApiError> {
    let rows = repositories::student_answers::list_scored(state.db(), Some(&student.id))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load scores"))?;
    Ok(Json(group_scores(rows)))
}

async fn load_exam(state: &AppState, exam_id: &str) -> Result<(Exam, Vec<Question>), ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::not_found("Exam"))?;
    let questions = repositories::questions::list_by_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    if questions.is_empty() {
        return Err(ApiError::BadRequest("This exam has no questions yet".to_string()));
    }
    Ok((exam, questions))
}

/// Answer text per question id; rejects unknown or repeated questions.
fn collect_answers<'a>(
    questions: &[Question],
    submission: &'a ExamSubmission,
) -> Result<HashMap<&'a str, &'a str>, ApiError> {
    let known: HashSet<&str> = questions.iter().map(|question| question.id.as_str()).collect();
    let mut answers = HashMap::with_capacity(submission.answers.len());

    for answer in &submission.answers {
        let question_id = answer.question_id.as_str();
        if !known.contains(question_id) {
            return Err(ApiError::BadRequest(format!(
                "Question {question_id} does not belong to this exam"
            )));
        }
        if answers.insert(question_id, answer.answer.trim()).is_some() {
            return Err(ApiError::BadRequest(format!("Question {question_id} answered twice")));
        }
    }

    Ok(answers)
}
