use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::normalize::TextNormalizer;
use super::sentiment::SentimentLexicon;
use super::tfidf::{TfIdfMatrix, VectorizeError};

pub(crate) const SIGNAL_COUNT: usize = 9;

/// Signal value ceiling; every signal lives on [0, MAX_SIGNAL].
pub(crate) const MAX_SIGNAL: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SignalKind {
    ExactMatch,
    PartialMatch,
    CosineSimilarity,
    Sentiment,
    EnhancedSentenceMatch,
    LexicalProbability,
    SemanticSimilarity,
    Coherence,
    Relevance,
}

impl SignalKind {
    /// Fixed signal order shared with the weight vector.
    pub(crate) const ALL: [SignalKind; SIGNAL_COUNT] = [
        SignalKind::ExactMatch,
        SignalKind::PartialMatch,
        SignalKind::CosineSimilarity,
        SignalKind::Sentiment,
        SignalKind::EnhancedSentenceMatch,
        SignalKind::LexicalProbability,
        SignalKind::SemanticSimilarity,
        SignalKind::Coherence,
        SignalKind::Relevance,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::PartialMatch => "partial_match",
            Self::CosineSimilarity => "cosine_similarity",
            Self::Sentiment => "sentiment",
            Self::EnhancedSentenceMatch => "enhanced_sentence_match",
            Self::LexicalProbability => "lexical_probability",
            Self::SemanticSimilarity => "semantic_similarity",
            Self::Coherence => "coherence",
            Self::Relevance => "relevance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub(crate) struct SimilaritySignals {
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

impl SimilaritySignals {
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
}

#[derive(Debug, Error)]
pub(crate) enum SignalError {
    #[error(transparent)]
    Vectorize(#[from] VectorizeError),
    #[error("signal produced a non-finite value")]
    NonFinite,
}

/// Both answers of one comparison, normalized once and shared by every signal.
#[derive(Debug)]
pub(crate) struct AnswerTexts<'a> {
    pub(crate) expected_raw: &'a str,
    pub(crate) actual_raw: &'a str,
    pub(crate) expected_tokens: Vec<String>,
    pub(crate) actual_tokens: Vec<String>,
}

impl<'a> AnswerTexts<'a> {
    pub(crate) fn new(normalizer: &TextNormalizer, expected: &'a str, actual: &'a str) -> Self {
        Self {
            expected_raw: expected,
            actual_raw: actual,
            expected_tokens: normalizer.tokens(expected),
            actual_tokens: normalizer.tokens(actual),
        }
    }

    pub(crate) fn expected_normalized(&self) -> String {
        self.expected_tokens.join(" ")
    }

    pub(crate) fn actual_normalized(&self) -> String {
        self.actual_tokens.join(" ")
    }

    fn expected_set(&self) -> HashSet<&str> {
        self.expected_tokens.iter().map(String::as_str).collect()
    }

    fn actual_set(&self) -> HashSet<&str> {
        self.actual_tokens.iter().map(String::as_str).collect()
    }
}

/// A text-similarity measure in [0, 1] between the expected and the student answer.
pub(crate) trait SimilarityStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn similarity(&self, texts: &AnswerTexts<'_>) -> Result<f64, SignalError>;
}

/// TF-IDF fitted over exactly the two normalized answers, compared by cosine.
#[derive(Debug, Default)]
pub(crate) struct TfIdfCosine;

impl SimilarityStrategy for TfIdfCosine {
    fn name(&self) -> &'static str {
        "tfidf_cosine"
    }

    fn similarity(&self, texts: &AnswerTexts<'_>) -> Result<f64, SignalError> {
        let expected = texts.expected_normalized();
        let actual = texts.actual_normalized();
        let matrix = TfIdfMatrix::fit(&[expected.as_str(), actual.as_str()])?;
        Ok(matrix.cosine(0, 1))
    }
}

/// Sentence-level TF-IDF: each expected sentence is matched with its closest student sentence
/// and the best similarities are averaged.
#[derive(Debug)]
pub(crate) struct SentenceTfIdfMatch {
    normalizer: Arc<TextNormalizer>,
}

impl SentenceTfIdfMatch {
    pub(crate) fn new(normalizer: Arc<TextNormalizer>) -> Self {
        Self { normalizer }
    }

    fn sentences(&self, text: &str) -> Vec<String> {
        split_sentences(text)
            .map(|sentence| self.normalizer.normalize(sentence))
            .filter(|sentence| !sentence.is_empty())
            .collect()
    }
}

impl SimilarityStrategy for SentenceTfIdfMatch {
    fn name(&self) -> &'static str {
        "sentence_tfidf_match"
    }

    fn similarity(&self, texts: &AnswerTexts<'_>) -> Result<f64, SignalError> {
        let expected = self.sentences(texts.expected_raw);
        let actual = self.sentences(texts.actual_raw);
        if expected.is_empty() || actual.is_empty() {
            return Err(VectorizeError::EmptyVocabulary.into());
        }

        let documents: Vec<&str> =
            expected.iter().chain(actual.iter()).map(String::as_str).collect();
        let matrix = TfIdfMatrix::fit(&documents)?;

        let offset = expected.len();
        let total: f64 = (0..expected.len())
            .map(|left| {
                (0..actual.len())
                    .map(|right| matrix.cosine(left, offset + right))
                    .fold(0.0, f64::max)
            })
            .sum();
        Ok(total / expected.len() as f64)
    }
}

/// The full signal set over one (expected, student) pair.
///
/// Every signal is total: failures inside a strategy are logged, counted and scored as 0.
#[derive(Debug)]
pub(crate) struct SignalSet {
    normalizer: Arc<TextNormalizer>,
    sentiment: SentimentLexicon,
    cosine: Box<dyn SimilarityStrategy>,
    sentence_match: Box<dyn SimilarityStrategy>,
}

impl SignalSet {
    pub(crate) fn new(normalizer: Arc<TextNormalizer>) -> Self {
        let sentence_match = Box::new(SentenceTfIdfMatch::new(normalizer.clone()));
        Self::with_strategies(normalizer, Box::new(TfIdfCosine), sentence_match)
    }

    pub(crate) fn with_strategies(
        normalizer: Arc<TextNormalizer>,
        cosine: Box<dyn SimilarityStrategy>,
        sentence_match: Box<dyn SimilarityStrategy>,
    ) -> Self {
        Self { normalizer, sentiment: SentimentLexicon::english(), cosine, sentence_match }
    }

    pub(crate) fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub(crate) fn compute(&self, expected: &str, actual: &str) -> SimilaritySignals {
        let texts = AnswerTexts::new(&self.normalizer, expected, actual);
        self.compute_prepared(&texts)
    }

    pub(crate) fn compute_prepared(&self, texts: &AnswerTexts<'_>) -> SimilaritySignals {
        SimilaritySignals {
            exact_match: exact_match(texts),
            partial_match: partial_match(texts),
            cosine_similarity: self.strategy_signal(
                SignalKind::CosineSimilarity,
                self.cosine.as_ref(),
                texts,
            ),
            sentiment: bounded(SignalKind::Sentiment, self.sentiment.score(texts.actual_raw)),
            enhanced_sentence_match: self.strategy_signal(
                SignalKind::EnhancedSentenceMatch,
                self.sentence_match.as_ref(),
                texts,
            ),
            lexical_probability: lexical_probability(texts),
            semantic_similarity: semantic_similarity(texts),
            coherence: coherence(texts),
            relevance: relevance(texts),
        }
    }

    fn strategy_signal(
        &self,
        kind: SignalKind,
        strategy: &dyn SimilarityStrategy,
        texts: &AnswerTexts<'_>,
    ) -> f64 {
        let result = strategy.similarity(texts).and_then(|value| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(SignalError::NonFinite)
            }
        });

        match result {
            Ok(value) => bounded(kind, value * MAX_SIGNAL),
            Err(err) => {
                tracing::debug!(
                    signal = kind.as_str(),
                    strategy = strategy.name(),
                    error = %err,
                    "Similarity signal degraded to zero"
                );
                metrics::counter!("similarity_signal_failures_total", "signal" => kind.as_str())
                    .increment(1);
                0.0
            }
        }
    }
}

fn bounded(kind: SignalKind, value: f64) -> f64 {
    if !value.is_finite() {
        tracing::warn!(signal = kind.as_str(), "Non-finite signal value replaced with zero");
        metrics::counter!("similarity_signal_failures_total", "signal" => kind.as_str())
            .increment(1);
        return 0.0;
    }
    value.clamp(0.0, MAX_SIGNAL)
}

pub(crate) fn exact_match(texts: &AnswerTexts<'_>) -> f64 {
    if !texts.expected_tokens.is_empty() && texts.expected_tokens == texts.actual_tokens {
        MAX_SIGNAL
    } else {
        0.0
    }
}

/// Share of the expected vocabulary present in the student answer.
pub(crate) fn partial_match(texts: &AnswerTexts<'_>) -> f64 {
    let expected = texts.expected_set();
    if expected.is_empty() {
        return 0.0;
    }
    let actual = texts.actual_set();
    let common = expected.intersection(&actual).count();
    common as f64 / expected.len() as f64 * MAX_SIGNAL
}

/// Share of student tokens (with repetition) drawn from the expected vocabulary.
pub(crate) fn lexical_probability(texts: &AnswerTexts<'_>) -> f64 {
    if texts.actual_tokens.is_empty() {
        return 0.0;
    }
    let expected = texts.expected_set();
    let hits = texts.actual_tokens.iter().filter(|token| expected.contains(token.as_str())).count();
    hits as f64 / texts.actual_tokens.len() as f64 * MAX_SIGNAL
}

/// Jaccard overlap of the two vocabularies.
pub(crate) fn semantic_similarity(texts: &AnswerTexts<'_>) -> f64 {
    let expected = texts.expected_set();
    let actual = texts.actual_set();
    let union = expected.union(&actual).count();
    if union == 0 {
        return 0.0;
    }
    expected.intersection(&actual).count() as f64 / union as f64 * MAX_SIGNAL
}

/// Self-consistency of the student answer: vocabulary diversity blended with the share of
/// sentences that carry at least three words.
pub(crate) fn coherence(texts: &AnswerTexts<'_>) -> f64 {
    if texts.actual_tokens.is_empty() {
        return 0.0;
    }
    let diversity = texts.actual_set().len() as f64 / texts.actual_tokens.len() as f64;

    let sentences: Vec<&str> = split_sentences(texts.actual_raw).collect();
    let structured = if sentences.is_empty() {
        0.0
    } else {
        let complete =
            sentences.iter().filter(|sentence| sentence.split_whitespace().count() >= 3).count();
        complete as f64 / sentences.len() as f64
    };

    (0.7 * diversity + 0.3 * structured) * MAX_SIGNAL
}

/// Overlap coefficient: shared vocabulary relative to the smaller of the two answers.
pub(crate) fn relevance(texts: &AnswerTexts<'_>) -> f64 {
    let expected = texts.expected_set();
    let actual = texts.actual_set();
    let smaller = expected.len().min(actual.len());
    if smaller == 0 {
        return 0.0;
    }
    expected.intersection(&actual).count() as f64 / smaller as f64 * MAX_SIGNAL
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?', '\n', ';']).map(str::trim).filter(|sentence| !sentence.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal_set() -> SignalSet {
        SignalSet::new(Arc::new(TextNormalizer::english()))
    }

    #[derive(Debug)]
    struct Broken;

    impl SimilarityStrategy for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn similarity(&self, _texts: &AnswerTexts<'_>) -> Result<f64, SignalError> {
            Ok(f64::NAN)
        }
    }

    #[test]
    fn partial_match_counts_expected_tokens() {
        let set = signal_set();
        let signals = set.compute(
            "photosynthesis converts light energy chemical",
            "photosynthesis converts light into sugar molecules",
        );
        assert!((signals.partial_match - 6.0).abs() < 1e-9);
    }

    #[test]
    fn identical_answers_max_out_similarity_signals() {
        let set = signal_set();
        let text = "Force equals mass times acceleration.";
        let signals = set.compute(text, text);
        assert_eq!(signals.exact_match, 10.0);
        assert!((signals.partial_match - 10.0).abs() < 1e-9);
        assert!((signals.cosine_similarity - 10.0).abs() < 1e-9);
        assert!((signals.enhanced_sentence_match - 10.0).abs() < 1e-9);
        assert!((signals.semantic_similarity - 10.0).abs() < 1e-9);
        assert!((signals.relevance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn every_signal_is_total_on_empty_inputs() {
        let set = signal_set();
        let cases = [("", ""), ("", "some answer"), ("expected answer", ""), ("the", "a an")];
        for (expected, actual) in cases {
            let signals = set.compute(expected, actual);
            for (kind, value) in SignalKind::ALL.iter().zip(signals.as_array()) {
                assert!(
                    (0.0..=10.0).contains(&value),
                    "{} = {value} for {expected:?}/{actual:?}",
                    kind.as_str()
                );
            }
            assert_eq!(signals.cosine_similarity, 0.0);
            assert_eq!(signals.enhanced_sentence_match, 0.0);
        }
    }

    #[test]
    fn cosine_signal_is_symmetric() {
        let set = signal_set();
        let left = "Global warming is caused by pollution and deforestation.";
        let right = "Deforestation and factory pollution heat the planet.";
        let forward = set.compute(left, right).cosine_similarity;
        let backward = set.compute(right, left).cosine_similarity;
        assert!((forward - backward).abs() < 1e-12);
        assert!(forward > 0.0 && forward < 10.0);
    }

    #[test]
    fn failing_strategy_degrades_to_zero() {
        let normalizer = Arc::new(TextNormalizer::english());
        let set = SignalSet::with_strategies(normalizer, Box::new(Broken), Box::new(Broken));
        let signals = set.compute("plants need light", "plants need light");
        assert_eq!(signals.cosine_similarity, 0.0);
        assert_eq!(signals.enhanced_sentence_match, 0.0);
        assert_eq!(signals.exact_match, 10.0);
    }

    #[test]
    fn overlap_family_signals_differ() {
        let set = signal_set();
        let signals = set.compute("alpha beta gamma delta", "alpha beta epsilon epsilon");
        assert!((signals.partial_match - 5.0).abs() < 1e-9);
        assert!((signals.lexical_probability - 5.0).abs() < 1e-9);
        assert!((signals.semantic_similarity - 4.0).abs() < 1e-9);
        assert!((signals.relevance - 2.0 / 3.0 * 10.0).abs() < 1e-9);
    }

    #[test]
    fn coherence_rewards_varied_complete_sentences() {
        let set = signal_set();
        let varied = set.compute("x", "Plants absorb sunlight. Leaves produce glucose daily.");
        let repetitive = set.compute("x", "plants plants plants plants");
        assert!(varied.coherence > repetitive.coherence);
        assert!(varied.coherence <= 10.0);
    }

    #[test]
    fn sentiment_only_reads_the_student_answer() {
        let set = signal_set();
        let neutral = set.compute("bad terrible harmful", "water boils at one hundred degrees");
        assert_eq!(neutral.sentiment, 5.0);
    }
}
