use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::core::config::Settings;
use crate::documents::{Document, DocumentKind};
use crate::services::text_extraction::OcrEngine;

/// Synchronous `files:annotate` only looks at the first five pages of a PDF.
const MAX_PDF_PAGES: u32 = 5;

/// Google Cloud Vision `DOCUMENT_TEXT_DETECTION` over REST.
#[derive(Debug, Clone)]
pub(crate) struct VisionOcrClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

impl VisionOcrClient {
    /// `None` when no Vision API key is configured.
    pub(crate) fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let ocr = settings.ocr();
        if ocr.vision_api_key.is_empty() {
            return Ok(None);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(ocr.vision_timeout_seconds))
            .build()
            .context("Failed to build Vision HTTP client")?;

        Ok(Some(Self {
            client,
            api_key: ocr.vision_api_key.clone(),
            base_url: ocr.vision_base_url.trim_end_matches('/').to_string(),
            max_retries: ocr.vision_max_retries,
        }))
    }

    async fn annotate_image(&self, bytes: &[u8]) -> Result<String> {
        let payload = json!({
            "requests": [{
                "image": {"content": STANDARD.encode(bytes)},
                "features": [{"type": "DOCUMENT_TEXT_DETECTION"}]
            }]
        });
        let body = self.post("images:annotate", &payload).await?;
        let response = first_response(&body)?;
        Ok(full_text(response).unwrap_or_default())
    }

    async fn annotate_pdf(&self, bytes: &[u8]) -> Result<String> {
        let payload = json!({
            "requests": [{
                "inputConfig": {"content": STANDARD.encode(bytes), "mimeType": "application/pdf"},
                "features": [{"type": "DOCUMENT_TEXT_DETECTION"}],
                "pages": (1..=MAX_PDF_PAGES).collect::<Vec<_>>()
            }]
        });
        let body = self.post("files:annotate", &payload).await?;
        let file = first_response(&body)?;
        let pages = file.get("responses").and_then(Value::as_array).cloned().unwrap_or_default();

        let texts: Vec<String> = pages
            .iter()
            .filter_map(|page| {
                if let Some(error) = page.get("error") {
                    tracing::warn!(error = %extract_error_message(error), "Vision skipped a page");
                    return None;
                }
                full_text(page)
            })
            .filter(|text| !text.trim().is_empty())
            .collect();

        Ok(texts.join("\n"))
    }

    async fn post(&self, method: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let response =
                self.client.post(&url).query(&[("key", &self.api_key)]).json(payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let raw_body = resp.text().await.context("Failed to read Vision response")?;
                    let parsed = serde_json::from_str::<Value>(&raw_body).map_err(|err| {
                        anyhow::anyhow!(
                            "Vision returned non-JSON body (status {}): {}: {}",
                            status,
                            err,
                            raw_body
                        )
                    })?;

                    if status.is_success() {
                        return Ok(parsed);
                    }
                    let message = parsed.get("error").map(extract_error_message);
                    last_error = Some(anyhow::anyhow!(
                        "Vision {} failed (status {}): {}",
                        method,
                        status,
                        message.unwrap_or_else(|| "unknown_error".to_string())
                    ));
                    if status.is_client_error() && status.as_u16() != 429 {
                        break;
                    }
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call Vision API"));
                }
            }

            if attempt < self.max_retries {
                let backoff = Duration::from_secs(2_u64.pow(attempt));
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown Vision API error")))
    }
}

#[async_trait]
impl OcrEngine for VisionOcrClient {
    async fn recognize(&self, document: &Document) -> Result<String> {
        match document.kind() {
            DocumentKind::Pdf => self.annotate_pdf(document.bytes()).await,
            _ => self.annotate_image(document.bytes()).await,
        }
    }
}

fn first_response(body: &Value) -> Result<&Value> {
    let response = body
        .get("responses")
        .and_then(|responses| responses.get(0))
        .context("Vision response has no entries")?;
    if let Some(error) = response.get("error") {
        anyhow::bail!("Vision annotation failed: {}", extract_error_message(error));
    }
    Ok(response)
}

fn full_text(response: &Value) -> Option<String> {
    response
        .pointer("/fullTextAnnotation/text")
        .and_then(Value::as_str)
        .map(|text| text.to_string())
}

fn extract_error_message(error: &Value) -> String {
    if let Some(text) = error.as_str() {
        return text.to_string();
    }
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.get("status").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}
