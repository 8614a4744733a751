use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::documents::encoding::decode_text;
use crate::documents::{pdf_text, Document, DocumentKind};
use crate::services::text_correction::TextCorrector;

#[derive(Debug, Error)]
pub(crate) enum ExtractionError {
    #[error("unsupported document type: .{0}")]
    Unsupported(String),
    #[error("no OCR backend is configured for {0}")]
    OcrUnavailable(String),
    #[error("OCR failed: {0:#}")]
    Ocr(anyhow::Error),
}

/// Produces the raw text of a student document.
#[async_trait]
pub(crate) trait TextExtractor: Send + Sync {
    async fn extract(&self, document: &Document) -> Result<String, ExtractionError>;
}

/// Recognizes text in scanned pages or images.
#[async_trait]
pub(crate) trait OcrEngine: Send + Sync {
    async fn recognize(&self, document: &Document) -> anyhow::Result<String>;
}

/// Picks a strategy by file type: decoded text for `.txt`, the embedded text layer for PDFs
/// (OCR when the layer is empty) and OCR for images.
#[derive(Clone, Default)]
pub(crate) struct DocumentTextExtractor {
    ocr: Option<Arc<dyn OcrEngine>>,
    corrector: Option<TextCorrector>,
}

impl DocumentTextExtractor {
    pub(crate) fn new(ocr: Option<Arc<dyn OcrEngine>>, corrector: Option<TextCorrector>) -> Self {
        Self { ocr, corrector }
    }

    async fn recognize(&self, document: &Document) -> Result<String, ExtractionError> {
        let Some(ocr) = &self.ocr else {
            return Err(ExtractionError::OcrUnavailable(document.filename().to_string()));
        };
        let text = ocr.recognize(document).await.map_err(ExtractionError::Ocr)?;

        match &self.corrector {
            Some(corrector) => Ok(corrector.correct(&text).await),
            None => Ok(text),
        }
    }
}

#[async_trait]
impl TextExtractor for DocumentTextExtractor {
    async fn extract(&self, document: &Document) -> Result<String, ExtractionError> {
        match document.kind() {
            DocumentKind::PlainText => {
                let (text, encoding) = decode_text(document.bytes());
                tracing::debug!(
                    filename = document.filename(),
                    encoding = encoding.as_str(),
                    "Decoded plain-text answer sheet"
                );
                Ok(text)
            }
            DocumentKind::Pdf => {
                match pdf_text(document.bytes().to_vec()).await {
                    Ok(text) if !text.trim().is_empty() => return Ok(text),
                    Ok(_) => {
                        tracing::info!(
                            filename = document.filename(),
                            "PDF has no text layer; falling back to OCR"
                        );
                    }
                    Err(err) => {
                        tracing::warn!(
                            filename = document.filename(),
                            error = %err,
                            "PDF text extraction failed; falling back to OCR"
                        );
                    }
                }
                self.recognize(document).await
            }
            DocumentKind::Image => self.recognize(document).await,
            DocumentKind::Docx | DocumentKind::Unsupported => {
                Err(ExtractionError::Unsupported(document.extension()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::tests::pdf_without_resources;

    struct FixedOcr(&'static str);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize(&self, _document: &Document) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOcr;

    #[async_trait]
    impl OcrEngine for FailingOcr {
        async fn recognize(&self, _document: &Document) -> anyhow::Result<String> {
            anyhow::bail!("backend down")
        }
    }

    #[tokio::test]
    async fn plain_text_is_decoded() {
        let extractor = DocumentTextExtractor::default();
        let document = Document::new("sheet.txt", b"Q1. r\xE9ponse".to_vec());
        assert_eq!(extractor.extract(&document).await.expect("text"), "Q1. réponse");
    }

    #[tokio::test]
    async fn images_go_through_ocr() {
        let extractor = DocumentTextExtractor::new(Some(Arc::new(FixedOcr("Q1. mass"))), None);
        let document = Document::new("scan.png", vec![0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(extractor.extract(&document).await.expect("ocr text"), "Q1. mass");
    }

    #[tokio::test]
    async fn unreadable_pdf_falls_back_to_ocr() {
        let extractor = DocumentTextExtractor::new(Some(Arc::new(FixedOcr("scanned"))), None);
        let document = Document::new("sheet.pdf", b"not really a pdf".to_vec());
        assert_eq!(extractor.extract(&document).await.expect("ocr text"), "scanned");
    }

    #[tokio::test]
    async fn pdf_page_without_resources_takes_the_ocr_path() {
        let document = Document::new("sheet.pdf", pdf_without_resources());

        let err = DocumentTextExtractor::default().extract(&document).await.unwrap_err();
        assert!(matches!(err, ExtractionError::OcrUnavailable(_)));

        let extractor = DocumentTextExtractor::new(Some(Arc::new(FixedOcr("Q1. scanned"))), None);
        assert_eq!(extractor.extract(&document).await.expect("ocr text"), "Q1. scanned");
    }

    #[tokio::test]
    async fn missing_or_failing_ocr_is_an_error() {
        let document = Document::new("scan.jpg", vec![0xFF, 0xD8]);

        let extractor = DocumentTextExtractor::default();
        let err = extractor.extract(&document).await.unwrap_err();
        assert!(matches!(err, ExtractionError::OcrUnavailable(_)));

        let extractor = DocumentTextExtractor::new(Some(Arc::new(FailingOcr)), None);
        let err = extractor.extract(&document).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Ocr(_)));
    }

    #[tokio::test]
    async fn unsupported_types_are_rejected() {
        let extractor = DocumentTextExtractor::default();
        let err = extractor.extract(&Document::new("sheet.docx", Vec::new())).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Unsupported(ext) if ext == "docx"));
    }
}
