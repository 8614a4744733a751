use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::services::llm::{extract_json_object, LlmClient};

const FEEDBACK_SYSTEM_PROMPT: &str = "You are an experienced teacher grading a student's written \
answer against the ideal answer. Judge accuracy, completeness and understanding. Reply with a \
single JSON object and nothing else: {\"score\": <number from 0 to 10>, \"feedback\": \
\"<two or three sentences addressed to the student>\", \"suggestions\": [\"<short tip>\", ...]}";

#[derive(Debug, Error)]
pub(crate) enum FeedbackError {
    #[error("feedback service request failed: {0:#}")]
    Request(#[from] anyhow::Error),
    #[error("feedback service returned a malformed response: {0}")]
    Malformed(String),
    #[error("feedback service timed out after {0} seconds")]
    Timeout(u64),
}

impl FeedbackError {
    pub(crate) fn outcome_label(&self) -> &'static str {
        match self {
            Self::Request(_) => "error",
            Self::Malformed(_) => "malformed",
            Self::Timeout(_) => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Feedback {
    /// In [0, 10].
    pub(crate) score: f64,
    pub(crate) feedback: String,
    pub(crate) suggestions: Vec<String>,
}

impl Feedback {
    /// Feedback text with suggestions appended, as stored on a result.
    pub(crate) fn render(&self) -> String {
        if self.suggestions.is_empty() {
            return self.feedback.clone();
        }
        format!("{}\nSuggestions: {}", self.feedback, self.suggestions.join("; "))
    }
}

/// Scores one answer and explains the score.
#[async_trait]
pub(crate) trait FeedbackService: Send + Sync {
    async fn feedback(
        &self,
        question: &str,
        ideal_answer: &str,
        student_answer: &str,
    ) -> Result<Feedback, FeedbackError>;
}

#[derive(Debug, Clone)]
pub(crate) struct LlmFeedbackClient {
    llm: LlmClient,
}

impl LlmFeedbackClient {
    pub(crate) fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl FeedbackService for LlmFeedbackClient {
    async fn feedback(
        &self,
        question: &str,
        ideal_answer: &str,
        student_answer: &str,
    ) -> Result<Feedback, FeedbackError> {
        let prompt = format!(
            "Question:\n{question}\n\nIdeal answer:\n{ideal_answer}\n\nStudent answer:\n\
             {student_answer}\n\nGrade the student answer from 0 to 10."
        );
        let content = self.llm.complete(FEEDBACK_SYSTEM_PROMPT, &prompt, true).await?;
        parse_feedback(&content)
    }
}

pub(crate) fn parse_feedback(content: &str) -> Result<Feedback, FeedbackError> {
    let value = extract_json_object(content)
        .ok_or_else(|| FeedbackError::Malformed("no JSON object in response".to_string()))?;

    let score = match value.get("score") {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|score| score.is_finite())
    .ok_or_else(|| FeedbackError::Malformed("missing or non-numeric score".to_string()))?;

    let feedback = value
        .get("feedback")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| FeedbackError::Malformed("missing feedback text".to_string()))?
        .to_string();

    let suggestions = value
        .get("suggestions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Feedback { score: score.clamp(0.0, 10.0), feedback, suggestions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_feedback() {
        let parsed = parse_feedback(
            r#"{"score": 7.5, "feedback": " Solid answer. ", "suggestions": ["Add units", ""]}"#,
        )
        .expect("feedback");
        assert_eq!(parsed.score, 7.5);
        assert_eq!(parsed.feedback, "Solid answer.");
        assert_eq!(parsed.suggestions, vec!["Add units"]);
        assert_eq!(parsed.render(), "Solid answer.\nSuggestions: Add units");
    }

    #[test]
    fn score_is_clamped_and_string_scores_accepted() {
        let parsed = parse_feedback(r#"{"score": "14", "feedback": "Great"}"#).expect("feedback");
        assert_eq!(parsed.score, 10.0);
        assert!(parsed.suggestions.is_empty());
        assert_eq!(parsed.render(), "Great");
    }

    #[test]
    fn malformed_responses_are_rejected() {
        for content in [
            "I think this deserves a 7",
            r#"{"feedback": "no score"}"#,
            r#"{"score": "seven", "feedback": "x"}"#,
            r#"{"score": 6}"#,
            r#"{"score": 6, "feedback": "   "}"#,
        ] {
            let err = parse_feedback(content).unwrap_err();
            assert!(matches!(err, FeedbackError::Malformed(_)), "{content}: {err}");
        }
    }
}
