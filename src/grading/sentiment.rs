use std::collections::HashMap;

use super::normalize::strip_punctuation;

/// Valence lexicon on a [-4, 4] scale, a small subset of the usual social-media lexicons
/// restricted to words that turn up in written exam answers.
const LEXICON: &[(&str, f64)] = &[
    ("good", 1.9),
    ("great", 3.1),
    ("excellent", 3.2),
    ("best", 3.2),
    ("better", 1.9),
    ("positive", 2.3),
    ("benefit", 2.0),
    ("beneficial", 1.9),
    ("useful", 1.9),
    ("helpful", 1.9),
    ("important", 1.5),
    ("effective", 2.1),
    ("efficient", 1.8),
    ("correct", 1.7),
    ("right", 1.0),
    ("true", 1.8),
    ("clear", 1.6),
    ("healthy", 1.7),
    ("safe", 1.9),
    ("success", 2.7),
    ("successful", 2.8),
    ("improve", 1.9),
    ("improves", 1.9),
    ("improvement", 2.0),
    ("growth", 1.6),
    ("protect", 1.4),
    ("protects", 1.4),
    ("support", 1.7),
    ("strong", 2.3),
    ("stable", 1.2),
    ("easy", 1.9),
    ("happy", 2.7),
    ("love", 3.2),
    ("like", 1.5),
    ("agree", 1.5),
    ("advantage", 1.0),
    ("well", 1.1),
    ("bad", -2.5),
    ("worse", -2.1),
    ("worst", -3.1),
    ("negative", -2.7),
    ("harm", -2.5),
    ("harmful", -2.6),
    ("damage", -2.2),
    ("damages", -2.2),
    ("danger", -2.4),
    ("dangerous", -2.1),
    ("risk", -1.1),
    ("problem", -1.7),
    ("problems", -1.7),
    ("wrong", -2.1),
    ("false", -1.0),
    ("error", -1.7),
    ("fail", -2.5),
    ("failure", -2.3),
    ("poor", -2.1),
    ("weak", -1.9),
    ("difficult", -1.5),
    ("loss", -1.3),
    ("lose", -1.7),
    ("disease", -1.5),
    ("death", -2.9),
    ("die", -2.9),
    ("pollution", -1.5),
    ("destroy", -2.8),
    ("destruction", -2.7),
    ("threat", -2.4),
    ("crisis", -3.1),
    ("conflict", -1.3),
    ("war", -2.9),
    ("hate", -2.7),
    ("sad", -2.1),
    ("unfortunately", -1.4),
    ("disadvantage", -1.8),
    ("toxic", -2.2),
    ("unsafe", -2.3),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "without", "cannot",
    "cant", "dont", "doesnt", "didnt", "isnt", "arent", "wasnt", "werent", "wont", "wouldnt",
    "shouldnt", "couldnt",
];

/// How many preceding tokens a negation reaches back over.
const NEGATION_WINDOW: usize = 3;
const NEGATION_SCALAR: f64 = -0.74;
/// Normalization constant mapping an unbounded valence sum into (-1, 1).
const ALPHA: f64 = 15.0;

#[derive(Debug, Clone)]
pub(crate) struct SentimentLexicon {
    valences: HashMap<&'static str, f64>,
}

impl SentimentLexicon {
    pub(crate) fn english() -> Self {
        Self { valences: LEXICON.iter().copied().collect() }
    }

    /// Compound polarity in [-1, 1]; text without any lexicon word is 0.
    pub(crate) fn polarity(&self, text: &str) -> f64 {
        let cleaned = strip_punctuation(&text.to_lowercase());
        let tokens: Vec<&str> = cleaned.split_whitespace().collect();

        let mut sum = 0.0;
        for (position, token) in tokens.iter().enumerate() {
            let Some(valence) = self.valences.get(*token) else {
                continue;
            };
            let start = position.saturating_sub(NEGATION_WINDOW);
            let negated = tokens[start..position]
                .iter()
                .any(|word| NEGATIONS.iter().any(|negation| negation == word));
            sum += if negated { valence * NEGATION_SCALAR } else { *valence };
        }

        if sum == 0.0 {
            return 0.0;
        }
        (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0)
    }

    /// Polarity rescaled to [0, 10] with neutral text at 5.
    pub(crate) fn score(&self, text: &str) -> f64 {
        (self.polarity(text) + 1.0) * 5.0
    }
}
