use serde::Serialize;

use crate::db::models::ScoredAnswerRow;
use crate::grading::aggregate::MAX_SCORE;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct ScoredAnswerResponse {
    pub(crate) answer_id: String,
    pub(crate) question_id: String,
    pub(crate) question: String,
    pub(crate) answer: String,
    pub(crate) score: f64,
}

/// One student's answers to one exam, with `max_score = answers * 10`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct ExamScoreGroup {
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) answers: Vec<ScoredAnswerResponse>,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
}

/// Groups rows by (exam, student), keeping the order in which groups first appear.
pub(crate) fn group_scores(rows: Vec<ScoredAnswerRow>) -> Vec<ExamScoreGroup> {
    let mut groups: Vec<ExamScoreGroup> = Vec::new();

    for row in rows {
        let answer = ScoredAnswerResponse {
            answer_id: row.answer_id,
            question_id: row.question_id,
            question: row.question_text,
            answer: row.answer_text,
            score: row.score,
        };

        let existing = groups
            .iter_mut()
            .find(|group| group.exam_id == row.exam_id && group.student_id == row.student_id);
        match existing {
            Some(group) => {
                group.total_score += answer.score;
                group.max_score += MAX_SCORE;
                group.answers.push(answer);
            }
            None => groups.push(ExamScoreGroup {
                exam_id: row.exam_id,
                exam_title: row.exam_title,
                student_id: row.student_id,
                student_name: row.student_name,
                total_score: answer.score,
                max_score: MAX_SCORE,
                answers: vec![answer],
            }),
        }
    }

    groups
}
