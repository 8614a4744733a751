use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::documents::docx::{self, DocxError};
use crate::documents::encoding::decode_text;
use crate::documents::{pdf_text_blocking, Document, DocumentKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct QuestionAnswerPair {
    pub(crate) question: String,
    pub(crate) ideal_answer: String,
}

#[derive(Debug, Error)]
pub(crate) enum AnswerKeyError {
    #[error("unsupported answer key format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Docx(#[from] DocxError),
    #[error("failed to read pdf answer key: {0}")]
    Pdf(String),
    #[error("answer key contains no questions")]
    Empty,
}

/// Reads an answer key document into ordered (question, ideal answer) pairs.
pub(crate) fn load(document: &Document) -> Result<Vec<QuestionAnswerPair>, AnswerKeyError> {
    let pairs = match document.kind() {
        DocumentKind::Docx => from_paragraphs(docx::paragraphs(document.bytes())?),
        DocumentKind::PlainText => {
            let (text, encoding) = decode_text(document.bytes());
            tracing::debug!(
                filename = document.filename(),
                encoding = encoding.as_str(),
                "Decoded plain-text answer key"
            );
            from_plain_text(&text)
        }
        DocumentKind::Pdf => {
            let text = pdf_text_blocking(document.bytes())
                .map_err(|err| AnswerKeyError::Pdf(err.to_string()))?;
            from_plain_text(&text)
        }
        DocumentKind::Image | DocumentKind::Unsupported => {
            return Err(AnswerKeyError::UnsupportedFormat(document.extension()));
        }
    };

    if pairs.is_empty() {
        return Err(AnswerKeyError::Empty);
    }
    Ok(pairs)
}

/// Paragraph-structured keys: the first paragraph of a pair is the question and the following
/// ones the ideal answer. A blank paragraph closes the pair once it has an answer; blanks before
/// the first answer paragraph are skipped. A trailing question without an answer is dropped.
pub(crate) fn from_paragraphs<I, S>(paragraphs: I) -> Vec<QuestionAnswerPair>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut pairs = Vec::new();
    let mut question: Option<String> = None;
    let mut answer_lines: Vec<String> = Vec::new();

    for paragraph in paragraphs {
        let text = paragraph.as_ref().trim();
        if text.is_empty() {
            if !answer_lines.is_empty() {
                if let Some(question) = question.take() {
                    pairs.push(QuestionAnswerPair {
                        question,
                        ideal_answer: answer_lines.join("\n"),
                    });
                }
                answer_lines.clear();
            }
        } else if question.is_none() {
            question = Some(text.to_string());
        } else {
            answer_lines.push(text.to_string());
        }
    }
    if let (Some(question), false) = (question, answer_lines.is_empty()) {
        pairs.push(QuestionAnswerPair { question, ideal_answer: answer_lines.join("\n") });
    }

    pairs
}

/// Plain-text keys: sections separated by blank lines, first line of a section is the
/// question and the remaining lines the ideal answer (possibly empty).
pub(crate) fn from_plain_text(text: &str) -> Vec<QuestionAnswerPair> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut pairs = Vec::new();
    let mut section: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            flush_section(&mut pairs, &mut section);
        } else {
            section.push(line);
        }
    }
    flush_section(&mut pairs, &mut section);

    pairs
}

fn flush_section(pairs: &mut Vec<QuestionAnswerPair>, section: &mut Vec<&str>) {
    if let Some((question, answer)) = section.split_first() {
        pairs.push(QuestionAnswerPair {
            question: question.to_string(),
            ideal_answer: answer.join("\n"),
        });
    }
    section.clear();
}
