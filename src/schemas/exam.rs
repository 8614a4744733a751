use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Exam, ExpectedAnswer, Question};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, max = 255, message = "title must be 1 to 255 characters"))]
    pub(crate) title: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[validate(length(min = 1, max = 255, message = "title must be 1 to 255 characters"))]
    pub(crate) title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamListQuery {
    #[serde(default)]
    #[serde(alias = "teacherId")]
    pub(crate) teacher_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            created_by: exam.created_by,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "question text must not be empty"))]
    pub(crate) text: String,
    #[serde(alias = "expectedAnswers")]
    #[validate(length(min = 1, message = "at least one expected answer is required"))]
    pub(crate) expected_answers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExpectedAnswerResponse {
    pub(crate) id: String,
    pub(crate) text: String,
}

impl ExpectedAnswerResponse {
    pub(crate) fn from_db(answer: ExpectedAnswer) -> Self {
        Self { id: answer.id, text: answer.text }
    }
}

/// A question as authors see it, with its accepted answers.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) text: String,
    pub(crate) order_index: i32,
    pub(crate) expected_answers: Vec<ExpectedAnswerResponse>,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question, expected_answers: Vec<ExpectedAnswer>) -> Self {
        Self {
            id: question.id,
            exam_id: question.exam_id,
            text: question.text,
            order_index: question.order_index,
            expected_answers: expected_answers
                .into_iter()
                .map(ExpectedAnswerResponse::from_db)
                .collect(),
        }
    }
}

/// A question as students see it.
#[derive(Debug, Serialize)]
pub(crate) struct StudentQuestionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) order_index: i32,
}

impl StudentQuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self { id: question.id, text: question.text, order_index: question.order_index }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) questions: Vec<StudentQuestionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AnswerSubmission {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
    pub(crate) answer: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamSubmission {
    #[validate(length(min = 1, message = "at least one answer is required"))]
    pub(crate) answers: Vec<AnswerSubmission>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_need_at_least_one_answer() {
        let payload: ExamSubmission = serde_json::from_value(serde_json::json!({
            "answers": [{"questionId": "q1", "answer": "F = ma"}]
        }))
        .expect("payload");
        assert!(payload.validate().is_ok());
        assert_eq!(payload.answers[0].question_id, "q1");

        let empty: ExamSubmission =
            serde_json::from_value(serde_json::json!({"answers": []})).expect("payload");
        let errors = empty.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("answers"));
    }
}
