use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::core::config::Settings;

/// Minimal client for an OpenAI-compatible `chat/completions` endpoint (OpenAI, Ollama,
/// vLLM and friends).
#[derive(Debug, Clone)]
pub(crate) struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_retries: u32,
}

impl LlmClient {
    /// `None` when the feedback service is switched off.
    pub(crate) fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let feedback = settings.feedback();
        if !feedback.enabled {
            return Ok(None);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(feedback.timeout_seconds))
            .build()
            .context("Failed to build LLM HTTP client")?;

        Ok(Some(Self {
            client,
            api_key: feedback.api_key.clone(),
            base_url: feedback.base_url.trim_end_matches('/').to_string(),
            model: feedback.model.clone(),
            max_tokens: feedback.max_tokens,
            temperature: feedback.temperature,
            max_retries: feedback.max_retries,
        }))
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    /// Sends one system + user exchange and returns the assistant message content.
    pub(crate) async fn complete(
        &self,
        system: &str,
        user: &str,
        json_mode: bool,
    ) -> Result<String> {
        let mut payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": false
        });
        if json_mode {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let url = format!("{}/chat/completions", self.base_url);
        let timer = Instant::now();
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=self.max_retries {
            let mut request = self.client.post(&url).json(&payload);
            if !self.api_key.is_empty() {
                request = request.bearer_auth(&self.api_key);
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow::anyhow!("LLM API error (status {status}): {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call LLM API"));
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt))).await;
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let content = message_content(&body).context("Missing LLM response content")?;
        let tokens_used = body.pointer("/usage/total_tokens").and_then(serde_json::Value::as_u64);

        tracing::debug!(
            model = %self.model,
            duration_seconds = timer.elapsed().as_secs_f64(),
            tokens_used,
            "LLM completion received"
        );

        Ok(content.to_string())
    }
}

pub(crate) fn message_content(body: &Value) -> Option<&str> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
}

/// Pulls the first JSON object out of a completion, tolerating markdown fences and chatter
/// around it.
pub(crate) fn extract_json_object(content: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(content.trim()) {
        return value.is_object().then_some(value);
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&content[start..=end]).ok().filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_reads_first_choice() {
        let body = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(message_content(&body), Some("hello"));
        assert_eq!(message_content(&json!({"choices": []})), None);
    }

    #[test]
    fn extract_json_object_handles_fenced_output() {
        let content = "Sure!\n```json\n{\"score\": 7, \"feedback\": \"ok\"}\n```";
        let value = extract_json_object(content).expect("json object");
        assert_eq!(value["score"], json!(7));
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
    }
}
