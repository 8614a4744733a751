use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Student answer used when a question has no matching segment.
pub(crate) const NO_ANSWER_PLACEHOLDER: &str = "No answer provided.";

/// One question-answer unit found in extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StudentAnswerBlock {
    pub(crate) index: usize,
    /// Question number parsed from the boundary line, when it carried one.
    pub(crate) question_number: Option<u32>,
    pub(crate) raw_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PairingStrategy {
    /// Block `i` answers question `i`.
    Positional,
    /// Blocks are matched by their parsed question number, untagged blocks fill the rest in
    /// order.
    Tagged,
}

impl PairingStrategy {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Positional => "positional",
            Self::Tagged => "tagged",
        }
    }
}

fn boundary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:q\s*\d+|\d+\s*[.)]|q.*\?)")
            .expect("question boundary pattern is valid")
    })
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:q(?:uestion)?\s*(\d+)|(\d+)\s*[.)])")
            .expect("question number pattern is valid")
    })
}

/// Whether a trimmed line opens a new question.
pub(crate) fn is_boundary(line: &str) -> bool {
    let line = line.trim();
    boundary_pattern().is_match(line) || line.ends_with('?')
}

pub(crate) fn question_number(line: &str) -> Option<u32> {
    let captures = number_pattern().captures(line.trim())?;
    captures.get(1).or_else(|| captures.get(2))?.as_str().parse().ok()
}

/// Splits extracted text into per-question blocks in input order.
///
/// Without any boundary line the whole text is one block; empty text yields no blocks.
pub(crate) fn segment(raw_text: &str) -> Vec<StudentAnswerBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw_text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if is_boundary(line) && !current.is_empty() {
            flush(&mut blocks, &mut current);
        }
        current.push(line);
    }
    if !current.is_empty() {
        flush(&mut blocks, &mut current);
    }

    blocks
}

fn flush(blocks: &mut Vec<StudentAnswerBlock>, current: &mut Vec<&str>) {
    let question_number = current.first().and_then(|line| {
        if is_boundary(line) {
            question_number(line)
        } else {
            None
        }
    });
    blocks.push(StudentAnswerBlock {
        index: blocks.len(),
        question_number,
        raw_text: current.join("\n"),
    });
    current.clear();
}

/// Resolves one student answer per question. Missing answers get the placeholder and surplus
/// blocks are dropped.
pub(crate) fn pair_answers(
    blocks: &[StudentAnswerBlock],
    question_count: usize,
    strategy: PairingStrategy,
) -> Vec<String> {
    let slots = match strategy {
        PairingStrategy::Positional => positional_slots(blocks, question_count),
        PairingStrategy::Tagged => tagged_slots(blocks, question_count),
    };

    slots
        .into_iter()
        .map(|slot| match slot {
            Some(block) => block.raw_text.clone(),
            None => NO_ANSWER_PLACEHOLDER.to_string(),
        })
        .collect()
}

fn positional_slots(
    blocks: &[StudentAnswerBlock],
    question_count: usize,
) -> Vec<Option<&StudentAnswerBlock>> {
    (0..question_count).map(|index| blocks.get(index)).collect()
}

fn tagged_slots(
    blocks: &[StudentAnswerBlock],
    question_count: usize,
) -> Vec<Option<&StudentAnswerBlock>> {
    let mut slots: Vec<Option<&StudentAnswerBlock>> = vec![None; question_count];
    let mut claimed: HashSet<usize> = HashSet::new();

    for block in blocks {
        let Some(number) = block.question_number else {
            continue;
        };
        let Some(slot) = (number as usize).checked_sub(1) else {
            continue;
        };
        if slot < question_count && slots[slot].is_none() {
            slots[slot] = Some(block);
            claimed.insert(block.index);
        }
    }

    let mut leftovers = blocks.iter().filter(|block| !claimed.contains(&block.index));
    for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
        match leftovers.next() {
            Some(block) => *slot = Some(block),
            None => break,
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_patterns() {
        for line in [
            "Q1. Define force",
            "q2) Explain",
            "Q3",
            "Q 4 what is energy",
            "5) Name the planets",
            "6. List the gases",
            "What is photosynthesis?",
            "Question: why is the sky blue?",
        ] {
            assert!(is_boundary(line), "{line:?} should be a boundary");
        }
        for line in ["Force equals mass times acceleration.", "The answer is quick", "Photo"] {
            assert!(!is_boundary(line), "{line:?} should not be a boundary");
        }
    }

    #[test]
    fn question_numbers_are_parsed() {
        assert_eq!(question_number("Q12. Define"), Some(12));
        assert_eq!(question_number("q 3) text"), Some(3));
        assert_eq!(question_number("Question 7"), Some(7));
        assert_eq!(question_number("4) text"), Some(4));
        assert_eq!(question_number("What is energy?"), None);
    }

    #[test]
    fn numbered_questions_produce_one_block_each() {
        let n = 7;
        let text: String = (1..=n)
            .map(|i| format!("Q{i}. Question number {i}\nAnswer line for {i}\n"))
            .collect();
        let blocks = segment(&text);
        assert_eq!(blocks.len(), n);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.index, i);
            assert_eq!(block.question_number, Some(i as u32 + 1));
            assert!(block.raw_text.starts_with(&format!("Q{}.", i + 1)));
            assert!(block.raw_text.ends_with(&format!("Answer line for {}", i + 1)));
        }
    }

    #[test]
    fn text_without_boundaries_is_one_block() {
        let text = "Plants make food.\n\n  Using sunlight and water.  \nAnd carbon dioxide.";
        let blocks = segment(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].raw_text,
            "Plants make food.\nUsing sunlight and water.\nAnd carbon dioxide."
        );
        assert_eq!(blocks[0].question_number, None);
    }

    #[test]
    fn leading_text_before_first_boundary_forms_its_own_block() {
        let blocks = segment("Name: Alice\nQ1. First\nanswer one\nQ2. Second\nanswer two");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].raw_text, "Name: Alice");
        assert_eq!(blocks[1].raw_text, "Q1. First\nanswer one");
        assert_eq!(blocks[2].question_number, Some(2));
    }

    #[test]
    fn empty_text_has_no_blocks() {
        assert!(segment("").is_empty());
        assert!(segment(" \n\n \t").is_empty());
    }

    #[test]
    fn positional_pairing_pads_and_truncates() {
        let blocks = segment("Q1. a\nQ2. b");
        let answers = pair_answers(&blocks, 3, PairingStrategy::Positional);
        assert_eq!(answers, vec!["Q1. a", "Q2. b", NO_ANSWER_PLACEHOLDER]);

        let answers = pair_answers(&blocks, 1, PairingStrategy::Positional);
        assert_eq!(answers, vec!["Q1. a"]);
    }

    #[test]
    fn tagged_pairing_follows_question_numbers() {
        let blocks = segment("Q2. second answer\nQ1. first answer\nQ9. out of range");
        let answers = pair_answers(&blocks, 3, PairingStrategy::Tagged);
        assert_eq!(answers[0], "Q1. first answer");
        assert_eq!(answers[1], "Q2. second answer");
        assert_eq!(answers[2], "Q9. out of range");
    }

    #[test]
    fn tagged_pairing_falls_back_to_position_for_untagged_blocks() {
        let blocks = segment("What is mass?\namount of matter\nQ1. force answer");
        let answers = pair_answers(&blocks, 2, PairingStrategy::Tagged);
        assert_eq!(answers[0], "Q1. force answer");
        assert_eq!(answers[1], "What is mass?\namount of matter");
    }

    #[test]
    fn pairing_always_returns_one_answer_per_question() {
        for strategy in [PairingStrategy::Positional, PairingStrategy::Tagged] {
            assert_eq!(pair_answers(&[], 4, strategy).len(), 4);
            assert!(pair_answers(&[], 0, strategy).is_empty());
        }
    }
}
