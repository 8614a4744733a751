use std::collections::HashSet;

/// English stopwords (NLTK list). Entries containing apostrophes are left out because
/// punctuation is stripped before the stopword filter runs, so they could never match.
const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "couldn", "didn",
    "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn", "needn", "shan", "shouldn",
    "wasn", "weren", "won", "wouldn",
];

/// Typographic punctuation that OCR output and word processors produce on top of ASCII.
const EXTRA_PUNCTUATION: &[char] = &[
    '\u{2018}', '\u{2019}', '\u{201A}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{2013}',
    '\u{2014}', '\u{2026}', '\u{00AB}', '\u{00BB}', '\u{00B7}', '\u{2022}',
];

#[derive(Debug, Clone)]
pub(crate) struct Stopwords(HashSet<String>);

impl Stopwords {
    pub(crate) fn english() -> Self {
        Self(ENGLISH_STOPWORDS.iter().map(|word| word.to_string()).collect())
    }

    pub(crate) fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Lowercases, strips punctuation and drops stopwords.
///
/// Built once at startup and shared read-only by every scorer.
#[derive(Debug, Clone)]
pub(crate) struct TextNormalizer {
    stopwords: Stopwords,
}

impl TextNormalizer {
    pub(crate) fn new(stopwords: Stopwords) -> Self {
        Self { stopwords }
    }

    pub(crate) fn english() -> Self {
        Self::new(Stopwords::english())
    }

    pub(crate) fn normalize(&self, text: &str) -> String {
        self.tokens(text).join(" ")
    }

    pub(crate) fn tokens(&self, text: &str) -> Vec<String> {
        strip_punctuation(&text.to_lowercase())
            .split_whitespace()
            .filter(|token| !self.stopwords.contains(token))
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn stopwords(&self) -> &Stopwords {
        &self.stopwords
    }
}

pub(crate) fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !is_punctuation(*c)).collect()
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || EXTRA_PUNCTUATION.contains(&c)
}
