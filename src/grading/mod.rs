pub(crate) mod aggregate;
pub(crate) mod answer_key;
pub(crate) mod evaluator;
pub(crate) mod normalize;
pub(crate) mod segment;
pub(crate) mod sentiment;
pub(crate) mod signals;
pub(crate) mod tfidf;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::core::config::Settings;
use crate::services::feedback::{FeedbackService, LlmFeedbackClient};
use crate::services::llm::LlmClient;
use crate::services::text_correction::TextCorrector;
use crate::services::text_extraction::{DocumentTextExtractor, OcrEngine};
use crate::services::vision_ocr::VisionOcrClient;

use self::aggregate::AnswerScorer;
use self::evaluator::Evaluator;
use self::normalize::TextNormalizer;
use self::signals::SignalSet;

/// Local scorer with the configured weights and mode.
pub(crate) fn build_scorer(settings: &Settings) -> anyhow::Result<AnswerScorer> {
    let scoring = settings.scoring();
    let weights = if scoring.renormalize_weights {
        scoring.weights.renormalized().context("Invalid score weights")?
    } else {
        scoring.weights.validate().context("Invalid score weights")?;
        scoring.weights
    };

    let signals = SignalSet::new(Arc::new(TextNormalizer::english()));
    Ok(AnswerScorer::new(signals, weights, scoring.mode))
}

/// Evaluator wired with every collaborator the settings enable.
pub(crate) fn build_evaluator(
    settings: &Settings,
    scorer: Arc<AnswerScorer>,
) -> anyhow::Result<Evaluator> {
    let llm = LlmClient::from_settings(settings)?;

    let ocr: Option<Arc<dyn OcrEngine>> = match VisionOcrClient::from_settings(settings)? {
        Some(client) => Some(Arc::new(client)),
        None => {
            tracing::info!("VISION_API_KEY not set; scanned answer sheets cannot be read");
            None
        }
    };

    let corrector = match (&llm, settings.ocr().text_correction) {
        (Some(llm), true) => Some(TextCorrector::new(llm.clone())),
        _ => None,
    };

    let feedback: Option<Arc<dyn FeedbackService>> = match llm {
        Some(llm) => {
            tracing::info!(model = llm.model(), "Feedback service enabled");
            Some(Arc::new(LlmFeedbackClient::new(llm)))
        }
        None => None,
    };

    Ok(Evaluator::new(
        Arc::new(DocumentTextExtractor::new(ocr, corrector)),
        feedback,
        Duration::from_secs(settings.feedback().timeout_seconds),
        scorer,
        settings.scoring().pairing,
    ))
}
