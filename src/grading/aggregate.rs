use std::collections::HashSet;

use thiserror::Error;

use super::signals::{
    AnswerTexts, SignalKind, SignalSet, SimilaritySignals, MAX_SIGNAL, SIGNAL_COUNT,
};

/// Highest score a single answer can receive.
pub(crate) const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Error, PartialEq)]
pub(crate) enum WeightsError {
    #[error("weight for {0} must be a finite, non-negative number")]
    Invalid(&'static str),
    #[error("at least one weight must be positive")]
    AllZero,
}

/// Named weights for the nine similarity signals, in signal order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScoreWeights {
    pub(crate) exact_match: f64,
    pub(crate) partial_match: f64,
    pub(crate) cosine_similarity: f64,
    pub(crate) sentiment: f64,
    pub(crate) enhanced_sentence_match: f64,
    pub(crate) lexical_probability: f64,
    pub(crate) semantic_similarity: f64,
    pub(crate) coherence: f64,
    pub(crate) relevance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            exact_match: 0.15,
            partial_match: 0.10,
            cosine_similarity: 0.10,
            sentiment: 0.05,
            enhanced_sentence_match: 0.10,
            lexical_probability: 0.10,
            semantic_similarity: 0.10,
            coherence: 0.10,
            relevance: 0.10,
        }
    }
}

impl ScoreWeights {
    pub(crate) fn get(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::ExactMatch => self.exact_match,
            SignalKind::PartialMatch => self.partial_match,
            SignalKind::CosineSimilarity => self.cosine_similarity,
            SignalKind::Sentiment => self.sentiment,
            SignalKind::EnhancedSentenceMatch => self.enhanced_sentence_match,
            SignalKind::LexicalProbability => self.lexical_probability,
            SignalKind::SemanticSimilarity => self.semantic_similarity,
            SignalKind::Coherence => self.coherence,
            SignalKind::Relevance => self.relevance,
        }
    }

    pub(crate) fn as_array(&self) -> [f64; SIGNAL_COUNT] {
        SignalKind::ALL.map(|kind| self.get(kind))
    }

    pub(crate) fn from_array(values: [f64; SIGNAL_COUNT]) -> Self {
        let [
            exact_match,
            partial_match,
            cosine_similarity,
            sentiment,
            enhanced_sentence_match,
            lexical_probability,
            semantic_similarity,
            coherence,
            relevance,
        ] = values;
        Self {
            exact_match,
            partial_match,
            cosine_similarity,
            sentiment,
            enhanced_sentence_match,
            lexical_probability,
            semantic_similarity,
            coherence,
            relevance,
        }
    }

    pub(crate) fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    pub(crate) fn validate(&self) -> Result<(), WeightsError> {
        for kind in SignalKind::ALL {
            let weight = self.get(kind);
            if !weight.is_finite() || weight < 0.0 {
                return Err(WeightsError::Invalid(kind.as_str()));
            }
        }
        if self.sum() <= 0.0 {
            return Err(WeightsError::AllZero);
        }
        Ok(())
    }

    /// Scales the weights so they sum to 1.0.
    pub(crate) fn renormalized(&self) -> Result<Self, WeightsError> {
        self.validate()?;
        let sum = self.sum();
        Ok(Self::from_array(self.as_array().map(|weight| weight / sum)))
    }
}

/// Weighted sum of the signals, each clamped to [0, 10], rounded to the nearest integer.
pub(crate) fn aggregate(signals: &[f64; SIGNAL_COUNT], weights: &[f64; SIGNAL_COUNT]) -> u8 {
    let total: f64 = signals
        .iter()
        .zip(weights)
        .map(|(signal, weight)| {
            let signal = if signal.is_finite() { signal.clamp(0.0, MAX_SIGNAL) } else { 0.0 };
            let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
            signal * weight
        })
        .sum();
    // Bounded to [0, 10] above, so the cast cannot truncate.
    total.round().clamp(0.0, MAX_SCORE) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScoringMode {
    Weighted,
    Overlap,
}

impl ScoringMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::Overlap => "overlap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScorePath {
    EmptyAnswer,
    IdenticalAnswer,
    Weighted,
    Overlap,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoreOutcome {
    pub(crate) score: f64,
    pub(crate) path: ScorePath,
    pub(crate) signals: Option<SimilaritySignals>,
}

impl ScoreOutcome {
    fn shortcut(score: f64, path: ScorePath) -> Self {
        Self { score, path, signals: None }
    }
}

/// Local scorer: applies the short-circuit rules and then the configured scoring mode.
#[derive(Debug)]
pub(crate) struct AnswerScorer {
    signals: SignalSet,
    weights: ScoreWeights,
    mode: ScoringMode,
}

impl AnswerScorer {
    /// `weights` are used as given; callers decide whether to renormalize first.
    pub(crate) fn new(signals: SignalSet, weights: ScoreWeights, mode: ScoringMode) -> Self {
        Self { signals, weights, mode }
    }

    pub(crate) fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub(crate) fn mode(&self) -> ScoringMode {
        self.mode
    }

    pub(crate) fn score(&self, expected: &str, actual: &str) -> ScoreOutcome {
        if let Some(outcome) = Self::trivial(expected, actual) {
            return outcome;
        }

        let texts = AnswerTexts::new(self.signals.normalizer(), expected, actual);
        if Self::same_tokens(&texts) {
            return ScoreOutcome::shortcut(MAX_SCORE, ScorePath::IdenticalAnswer);
        }

        match self.mode {
            ScoringMode::Weighted => {
                let signals = self.signals.compute_prepared(&texts);
                let score = aggregate(&signals.as_array(), &self.weights.as_array());
                ScoreOutcome {
                    score: f64::from(score),
                    path: ScorePath::Weighted,
                    signals: Some(signals),
                }
            }
            ScoringMode::Overlap => ScoreOutcome {
                score: overlap_score(expected, actual),
                path: ScorePath::Overlap,
                signals: None,
            },
        }
    }

    /// Empty or identical answers, which are decided without signals or external feedback.
    pub(crate) fn short_circuit(&self, expected: &str, actual: &str) -> Option<ScoreOutcome> {
        Self::trivial(expected, actual).or_else(|| {
            let texts = AnswerTexts::new(self.signals.normalizer(), expected, actual);
            Self::same_tokens(&texts)
                .then(|| ScoreOutcome::shortcut(MAX_SCORE, ScorePath::IdenticalAnswer))
        })
    }

    fn trivial(expected: &str, actual: &str) -> Option<ScoreOutcome> {
        if actual.trim().is_empty() {
            return Some(ScoreOutcome::shortcut(0.0, ScorePath::EmptyAnswer));
        }
        if expected.trim().to_lowercase() == actual.trim().to_lowercase() {
            return Some(ScoreOutcome::shortcut(MAX_SCORE, ScorePath::IdenticalAnswer));
        }
        None
    }

    fn same_tokens(texts: &AnswerTexts<'_>) -> bool {
        !texts.actual_tokens.is_empty() && texts.expected_tokens == texts.actual_tokens
    }

    /// Best outcome over several acceptable answers; `None` when there are no candidates.
    pub(crate) fn score_best<'a, I>(&self, expected: I, actual: &str) -> Option<ScoreOutcome>
    where
        I: IntoIterator<Item = &'a str>,
    {
        expected
            .into_iter()
            .map(|candidate| self.score(candidate, actual))
            .fold(None, |best: Option<ScoreOutcome>, outcome| match best {
                Some(current) if current.score >= outcome.score => Some(current),
                _ => Some(outcome),
            })
    }
}

/// Simplified scorer: share of lowercase ideal words found in the student answer, capped at 10.
pub(crate) fn overlap_score(ideal: &str, student: &str) -> f64 {
    let ideal_lower = ideal.to_lowercase();
    let student_lower = student.to_lowercase();
    let ideal_words: HashSet<&str> = ideal_lower.split_whitespace().collect();
    if ideal_words.is_empty() {
        return 0.0;
    }
    let student_words: HashSet<&str> = student_lower.split_whitespace().collect();
    let common = ideal_words.intersection(&student_words).count();
    (common as f64 / ideal_words.len() as f64 * MAX_SCORE).min(MAX_SCORE)
}

/// Canned feedback for locally scored answers.
pub(crate) fn feedback_for_score(score: f64) -> &'static str {
    if score >= 8.0 {
        "Excellent answer! Shows good understanding of the topic."
    } else if score >= 6.0 {
        "Good answer, but could be more detailed."
    } else if score >= 4.0 {
        "Basic understanding shown, but needs improvement."
    } else {
        "Answer needs significant improvement."
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::grading::normalize::TextNormalizer;

    fn scorer(mode: ScoringMode) -> AnswerScorer {
        let signals = SignalSet::new(Arc::new(TextNormalizer::english()));
        let weights = ScoreWeights::default().renormalized().expect("weights");
        AnswerScorer::new(signals, weights, mode)
    }

    #[test]
    fn default_weights_sum_below_one_until_renormalized() {
        let weights = ScoreWeights::default();
        assert!((weights.sum() - 0.9).abs() < 1e-9);
        let renormalized = weights.renormalized().expect("renormalize");
        assert!((renormalized.sum() - 1.0).abs() < 1e-9);
        assert!((renormalized.exact_match - 0.15 / 0.9).abs() < 1e-9);
    }

    #[test]
    fn invalid_weights_are_rejected() {
        let mut weights = ScoreWeights::default();
        weights.sentiment = -0.1;
        assert_eq!(weights.validate(), Err(WeightsError::Invalid("sentiment")));
        let zero = ScoreWeights::from_array([0.0; SIGNAL_COUNT]);
        assert_eq!(zero.renormalized(), Err(WeightsError::AllZero));
    }

    #[test]
    fn aggregate_rounds_weighted_sum() {
        let weights = [1.0 / 9.0; SIGNAL_COUNT];
        assert_eq!(aggregate(&[10.0; SIGNAL_COUNT], &weights), 10);
        assert_eq!(aggregate(&[0.0; SIGNAL_COUNT], &weights), 0);
        assert_eq!(aggregate(&[6.4; SIGNAL_COUNT], &weights), 6);
        assert_eq!(aggregate(&[6.6; SIGNAL_COUNT], &weights), 7);
    }

    #[test]
    fn aggregate_clamps_out_of_range_signals() {
        let weights = [1.0 / 9.0; SIGNAL_COUNT];
        assert_eq!(aggregate(&[100.0; SIGNAL_COUNT], &weights), 10);
        assert_eq!(aggregate(&[-5.0; SIGNAL_COUNT], &weights), 0);
        assert_eq!(aggregate(&[f64::NAN; SIGNAL_COUNT], &weights), 0);
    }

    #[test]
    fn literal_weights_cap_below_ten() {
        let weights = ScoreWeights::default().as_array();
        assert_eq!(aggregate(&[10.0; SIGNAL_COUNT], &weights), 9);
    }

    #[test]
    fn identical_answer_scores_ten() {
        let scorer = scorer(ScoringMode::Weighted);
        let text = "Force equals mass times acceleration.";
        let outcome = scorer.score(text, text);
        assert_eq!(outcome.score, 10.0);
        assert_eq!(outcome.path, ScorePath::IdenticalAnswer);
        assert!(outcome.signals.is_none());
    }

    #[test]
    fn normalized_equal_answers_score_ten() {
        let scorer = scorer(ScoringMode::Weighted);
        let expected = "The mitochondria, powerhouse of the cell!";
        let outcome = scorer.score(expected, "mitochondria powerhouse cell");
        assert_eq!(outcome.score, 10.0);
        assert_eq!(outcome.path, ScorePath::IdenticalAnswer);
    }

    #[test]
    fn empty_answer_scores_zero() {
        let scorer = scorer(ScoringMode::Weighted);
        let expected = "Global warming is caused by pollution and deforestation.";
        for actual in ["", "   ", "\n\t"] {
            let outcome = scorer.score(expected, actual);
            assert_eq!(outcome.score, 0.0);
            assert_eq!(outcome.path, ScorePath::EmptyAnswer);
        }
    }

    #[test]
    fn short_circuit_only_decides_trivial_answers() {
        let scorer = scorer(ScoringMode::Weighted);
        let expected = "Force equals mass times acceleration.";

        let empty = scorer.short_circuit(expected, "  ").expect("empty");
        assert_eq!((empty.score, empty.path), (0.0, ScorePath::EmptyAnswer));

        let same = scorer
            .short_circuit(expected, "force, equals mass times acceleration")
            .expect("same tokens");
        assert_eq!((same.score, same.path), (MAX_SCORE, ScorePath::IdenticalAnswer));

        assert!(scorer.short_circuit(expected, "mass and speed").is_none());
    }

    #[test]
    fn partial_overlap_lands_strictly_between_bounds() {
        let scorer = scorer(ScoringMode::Weighted);
        let outcome = scorer.score(
            "photosynthesis converts light energy chemical",
            "photosynthesis converts light sugar molecules",
        );
        let signals = outcome.signals.expect("weighted path computes signals");
        assert!((signals.partial_match - 6.0).abs() < 1e-9);
        assert_eq!(outcome.path, ScorePath::Weighted);
        assert!(outcome.score > 0.0 && outcome.score < 10.0, "score = {}", outcome.score);
        assert_eq!(outcome.score, outcome.score.round());
    }

    #[test]
    fn overlap_mode_uses_word_overlap() {
        let scorer = scorer(ScoringMode::Overlap);
        let outcome = scorer.score("water boils at 100 degrees", "water boils quickly");
        assert_eq!(outcome.path, ScorePath::Overlap);
        assert!((outcome.score - 4.0).abs() < 1e-9);
    }

    #[test]
    fn overlap_score_handles_empty_ideal() {
        assert_eq!(overlap_score("", "anything"), 0.0);
        assert_eq!(overlap_score("a b", "A B c d"), 10.0);
    }

    #[test]
    fn score_best_keeps_highest_candidate() {
        let scorer = scorer(ScoringMode::Weighted);
        let best = scorer
            .score_best(["completely unrelated words", "Newton second law"], "Newton second law")
            .expect("candidates");
        assert_eq!(best.score, 10.0);
        assert!(scorer.score_best(std::iter::empty(), "answer").is_none());
    }

    #[test]
    fn feedback_bands() {
        let excellent = "Excellent answer! Shows good understanding of the topic.";
        assert_eq!(feedback_for_score(9.0), excellent);
        assert_eq!(feedback_for_score(8.0), excellent);
        assert_eq!(feedback_for_score(6.5), "Good answer, but could be more detailed.");
        assert_eq!(feedback_for_score(4.0), "Basic understanding shown, but needs improvement.");
        assert_eq!(feedback_for_score(0.0), "Answer needs significant improvement.");
    }
}
