use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::aggregate::{feedback_for_score, AnswerScorer, MAX_SCORE};
use super::answer_key::{self, QuestionAnswerPair};
use super::segment::{pair_answers, segment, PairingStrategy, NO_ANSWER_PLACEHOLDER};
use crate::documents::Document;
use crate::services::feedback::{FeedbackError, FeedbackService};
use crate::services::text_extraction::TextExtractor;

/// Per-question outcome; this is also the shape of the persisted result artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct EvaluationResult {
    pub(crate) question: String,
    pub(crate) student_answer: String,
    pub(crate) ideal_answer: String,
    pub(crate) score: f64,
    pub(crate) feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum EvaluationStatus {
    Completed,
    AnswerKeyUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EvaluationReport {
    pub(crate) status: EvaluationStatus,
    pub(crate) message: Option<String>,
    pub(crate) results: Vec<EvaluationResult>,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
}

impl EvaluationReport {
    fn completed(results: Vec<EvaluationResult>) -> Self {
        let total_score = results.iter().map(|result| result.score).sum();
        let max_score = results.len() as f64 * MAX_SCORE;
        Self {
            status: EvaluationStatus::Completed,
            message: None,
            results,
            total_score,
            max_score,
        }
    }

    fn answer_key_unavailable(message: String) -> Self {
        Self {
            status: EvaluationStatus::AnswerKeyUnavailable,
            message: Some(message),
            results: Vec::new(),
            total_score: 0.0,
            max_score: 0.0,
        }
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.status == EvaluationStatus::Completed
    }

    /// `"<total>/<max>"` with integral values printed without a fraction.
    pub(crate) fn score_label(&self) -> String {
        format_score_label(self.total_score, self.max_score)
    }
}

pub(crate) fn format_score_label(total: f64, max: f64) -> String {
    format!("{}/{}", format_number(total), format_number(max))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// Grades one answer sheet against one answer key.
///
/// Holds only shared read-only collaborators, so one instance serves any number of concurrent
/// runs.
#[derive(Clone)]
pub(crate) struct Evaluator {
    extractor: Arc<dyn TextExtractor>,
    feedback: Option<Arc<dyn FeedbackService>>,
    feedback_timeout: Duration,
    scorer: Arc<AnswerScorer>,
    pairing: PairingStrategy,
}

impl Evaluator {
    pub(crate) fn new(
        extractor: Arc<dyn TextExtractor>,
        feedback: Option<Arc<dyn FeedbackService>>,
        feedback_timeout: Duration,
        scorer: Arc<AnswerScorer>,
        pairing: PairingStrategy,
    ) -> Self {
        Self { extractor, feedback, feedback_timeout, scorer, pairing }
    }

    pub(crate) fn scorer(&self) -> &AnswerScorer {
        &self.scorer
    }

    pub(crate) async fn evaluate(&self, sheet: &Document, key: &Document) -> EvaluationReport {
        let timer = Instant::now();

        let pairs = match load_answer_key(key.clone()).await {
            Ok(pairs) => pairs,
            Err(err) => {
                tracing::warn!(
                    answer_key = key.filename(),
                    error = %err,
                    "Answer key could not be loaded"
                );
                metrics::counter!("evaluations_total", "status" => "answer_key_unavailable")
                    .increment(1);
                return EvaluationReport::answer_key_unavailable(format!(
                    "Answer key could not be read: {err}"
                ));
            }
        };

        let raw_text = match self.extractor.extract(sheet).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    answer_sheet = sheet.filename(),
                    error = %err,
                    "Text extraction failed; grading as unanswered"
                );
                String::new()
            }
        };

        let results = self.evaluate_text(&raw_text, &pairs).await;
        let report = EvaluationReport::completed(results);

        metrics::counter!("evaluations_total", "status" => "completed").increment(1);
        metrics::histogram!("evaluation_duration_seconds").record(timer.elapsed().as_secs_f64());
        tracing::info!(
            answer_sheet = sheet.filename(),
            questions = report.results.len(),
            total_score = report.total_score,
            max_score = report.max_score,
            "Answer sheet evaluated"
        );

        report
    }

    /// Segments extracted text and grades every question of the key, in key order.
    pub(crate) async fn evaluate_text(
        &self,
        raw_text: &str,
        pairs: &[QuestionAnswerPair],
    ) -> Vec<EvaluationResult> {
        let blocks = segment(raw_text);
        let answers = pair_answers(&blocks, pairs.len(), self.pairing);

        let mut results = Vec::with_capacity(pairs.len());
        for (pair, student_answer) in pairs.iter().zip(answers) {
            let (score, feedback) = self.grade(pair, &student_answer).await;
            results.push(EvaluationResult {
                question: pair.question.clone(),
                student_answer,
                ideal_answer: pair.ideal_answer.clone(),
                score,
                feedback,
            });
        }
        results
    }

    async fn grade(&self, pair: &QuestionAnswerPair, student_answer: &str) -> (f64, String) {
        if student_answer == NO_ANSWER_PLACEHOLDER {
            return (0.0, NO_ANSWER_PLACEHOLDER.to_string());
        }

        if let Some(outcome) = self.scorer.short_circuit(&pair.ideal_answer, student_answer) {
            return (outcome.score, feedback_for_score(outcome.score).to_string());
        }

        if let Some(service) = &self.feedback {
            match self.remote_feedback(service.as_ref(), pair, student_answer).await {
                Ok((score, feedback)) => {
                    metrics::counter!("feedback_requests_total", "outcome" => "success")
                        .increment(1);
                    return (score, feedback);
                }
                Err(err) => {
                    metrics::counter!("feedback_requests_total", "outcome" => err.outcome_label())
                        .increment(1);
                    tracing::warn!(
                        error = %err,
                        question = %pair.question,
                        "Feedback service unavailable; using local scorer"
                    );
                }
            }
        }

        self.local_grade(pair, student_answer)
    }

    async fn remote_feedback(
        &self,
        service: &dyn FeedbackService,
        pair: &QuestionAnswerPair,
        student_answer: &str,
    ) -> Result<(f64, String), FeedbackError> {
        let call = service.feedback(&pair.question, &pair.ideal_answer, student_answer);
        let feedback = tokio::time::timeout(self.feedback_timeout, call)
            .await
            .map_err(|_| FeedbackError::Timeout(self.feedback_timeout.as_secs()))??;

        if !feedback.score.is_finite() {
            return Err(FeedbackError::Malformed("non-finite score".to_string()));
        }
        Ok((feedback.score.clamp(0.0, MAX_SCORE), feedback.render()))
    }

    fn local_grade(&self, pair: &QuestionAnswerPair, student_answer: &str) -> (f64, String) {
        let outcome = self.scorer.score(&pair.ideal_answer, student_answer);
        (outcome.score, feedback_for_score(outcome.score).to_string())
    }
}

/// Key parsing (docx unzip, pdf layout) is CPU-bound and runs on the blocking pool.
async fn load_answer_key(key: Document) -> Result<Vec<QuestionAnswerPair>, String> {
    tokio::task::spawn_blocking(move || answer_key::load(&key))
        .await
        .map_err(|err| format!("answer key parser aborted: {err}"))?
        .map_err(|err| err.to_string())
}
