pub(crate) mod docx;
pub(crate) mod encoding;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use anyhow::Context;
use thiserror::Error;

/// An uploaded or local file, held in memory for extraction and parsing.
#[derive(Debug, Clone)]
pub(crate) struct Document {
    filename: String,
    bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentKind {
    Docx,
    Pdf,
    PlainText,
    Image,
    Unsupported,
}

impl Document {
    pub(crate) fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }

    pub(crate) async fn read(path: &Path) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self::new(filename, bytes))
    }

    pub(crate) fn filename(&self) -> &str {
        &self.filename
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn extension(&self) -> String {
        file_extension(&self.filename)
    }

    pub(crate) fn kind(&self) -> DocumentKind {
        DocumentKind::from_extension(&self.extension())
    }
}

impl DocumentKind {
    pub(crate) fn from_extension(extension: &str) -> Self {
        match extension {
            "docx" => Self::Docx,
            "pdf" => Self::Pdf,
            "txt" => Self::PlainText,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" => Self::Image,
            _ => Self::Unsupported,
        }
    }
}

pub(crate) fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub(crate) enum PdfTextError {
    #[error("{0}")]
    Extract(String),
    #[error("pdf parser aborted: {0}")]
    Panicked(String),
}

/// Embedded text layer of a PDF, parsed on the blocking pool.
pub(crate) async fn pdf_text(bytes: Vec<u8>) -> Result<String, PdfTextError> {
    tokio::task::spawn_blocking(move || pdf_text_blocking(&bytes))
        .await
        .map_err(|err| PdfTextError::Panicked(err.to_string()))?
}

/// pdf-extract panics on some well-formed files (pages without `/Resources`, for one), so the
/// parser never runs outside `catch_unwind`.
pub(crate) fn pdf_text_blocking(bytes: &[u8]) -> Result<String, PdfTextError> {
    contain_panic(|| pdf_extract::extract_text_from_mem(bytes))?
        .map_err(|err| PdfTextError::Extract(err.to_string()))
}

fn contain_panic<T>(parse: impl FnOnce() -> T) -> Result<T, PdfTextError> {
    panic::catch_unwind(AssertUnwindSafe(parse))
        .map_err(|payload| PdfTextError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
