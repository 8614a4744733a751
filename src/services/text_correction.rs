use std::collections::HashSet;

use crate::services::llm::LlmClient;

const CORRECTION_SYSTEM_PROMPT: &str = "You fix OCR mistakes in scanned student answer sheets. \
Correct misrecognized characters, broken words and spacing only. Do not rephrase, summarize, \
answer questions or add content. Keep line breaks and question numbering. Reply with the \
corrected text only.";

/// Largest share of the original vocabulary a correction may change.
pub(crate) const MAX_CHANGED_WORD_RATIO: f64 = 0.2;

/// LLM pass over OCR output that only keeps conservative corrections.
#[derive(Debug, Clone)]
pub(crate) struct TextCorrector {
    llm: LlmClient,
}

impl TextCorrector {
    pub(crate) fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Returns the corrected text, or the original when the call fails or the model changed
    /// too much.
    pub(crate) async fn correct(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let corrected = match self.llm.complete(CORRECTION_SYSTEM_PROMPT, text, false).await {
            Ok(corrected) => corrected,
            Err(err) => {
                tracing::warn!(error = %err, "OCR text correction failed; keeping original text");
                return text.to_string();
            }
        };

        if accept_correction(text, &corrected) {
            corrected.trim().to_string()
        } else {
            tracing::info!(
                model = self.llm.model(),
                "OCR text correction rejected; too many words changed"
            );
            text.to_string()
        }
    }
}

/// A correction is kept when the symmetric difference of the lowercase word sets is at most
/// [`MAX_CHANGED_WORD_RATIO`] of the original word set.
pub(crate) fn accept_correction(original: &str, corrected: &str) -> bool {
    let original_lower = original.to_lowercase();
    let corrected_lower = corrected.to_lowercase();
    let before: HashSet<&str> = original_lower.split_whitespace().collect();
    let after: HashSet<&str> = corrected_lower.split_whitespace().collect();

    if before.is_empty() || after.is_empty() {
        return false;
    }

    let changed = before.symmetric_difference(&after).count();
    changed as f64 <= before.len() as f64 * MAX_CHANGED_WORD_RATIO
}
