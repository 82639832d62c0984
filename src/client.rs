//! OpenRouter-compatible chat-completions client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::{APP_TITLE, DEFAULT_SYSTEM_PROMPT};
use crate::error::AssistError;
use crate::settings::Settings;

pub const TEST_PROMPT: &str = "What model are you?";
pub const TEST_TEMPERATURE: f64 = 0.1;
pub const TEST_MAX_TOKENS: u32 = 50;
pub const TEST_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Outcome of a model health check.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    api_base: String,
    system_prompt: String,
}

impl CompletionClient {
    pub fn new(api_base: &str) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("smartassist/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: &str) -> Self {
        self.system_prompt = system_prompt.to_string();
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.api_base)
    }

    /// Send one resolved prompt and return the trimmed reply. One attempt,
    /// bounded by `settings.timeout_secs`.
    pub async fn complete(&self, prompt: &str, settings: &Settings) -> Result<String, AssistError> {
        let api_key = settings
            .api_key
            .as_deref()
            .ok_or_else(|| AssistError::Config("API Key not set. Please configure it in settings.".into()))?;
        let req = ChatRequest {
            model: &settings.selected_model,
            messages: vec![
                ChatMessage { role: "system", content: &self.system_prompt },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: Some(settings.temperature),
            max_tokens: None,
        };

        info!(
            model = %settings.selected_model,
            timeout = settings.timeout_secs,
            "Sending request to OpenRouter"
        );
        let body = self.exchange(api_key, &req, settings.timeout_secs).await?;
        if settings.verbose_logging {
            info!(
                "Full API response data:\n{}",
                serde_json::to_string_pretty(&body).unwrap_or_default()
            );
        }
        extract_content(body)
    }

    /// Fixed short prompt against `model`, for checking it responds at all.
    pub async fn test_completion(&self, model: &str, api_key: &str) -> HealthCheck {
        let req = ChatRequest {
            model,
            messages: vec![ChatMessage { role: "user", content: TEST_PROMPT }],
            temperature: Some(TEST_TEMPERATURE),
            max_tokens: Some(TEST_MAX_TOKENS),
        };
        let result = match self.exchange(api_key, &req, TEST_TIMEOUT_SECS).await {
            Ok(body) => extract_content(body).map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                debug!(model, "test success");
                HealthCheck { ok: true, error: None }
            }
            Err(e) => {
                let reason = match e {
                    AssistError::Timeout { seconds } => format!("Timeout after {seconds}s"),
                    AssistError::MalformedResponse => "Invalid response structure".to_string(),
                    AssistError::Api { status, message } => format!("API Error {status}: {message}"),
                    other => other.to_string(),
                };
                error!(model, "Test failed: {}", reason);
                HealthCheck { ok: false, error: Some(reason) }
            }
        }
    }

    /// Every model id the endpoint offers, sorted.
    pub async fn list_models(&self, api_key: &str) -> Result<Vec<String>, AssistError> {
        if api_key.is_empty() {
            return Err(AssistError::Config("Enter API Key to load models.".into()));
        }
        let resp = self
            .http
            .get(self.models_url())
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| AssistError::Network(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| AssistError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        let list: ModelList = serde_json::from_str(&text).map_err(|_| AssistError::MalformedResponse)?;
        let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        info!("Fetched models: {}", ids.len());
        Ok(ids)
    }

    async fn exchange(
        &self,
        api_key: &str,
        req: &ChatRequest<'_>,
        timeout_secs: u64,
    ) -> Result<Value, AssistError> {
        let call = async {
            let resp = self
                .http
                .post(self.chat_url())
                .bearer_auth(api_key)
                .header("HTTP-Referer", "https://github.com/kenzhangkentzhang-geek/smartassist")
                .header("X-Title", APP_TITLE)
                .json(req)
                .send()
                .await
                .map_err(|e| AssistError::Network(e.to_string()))?;
            let status = resp.status();
            debug!("OpenRouter response status: {}", status);
            let text = resp.text().await.map_err(|e| AssistError::Network(e.to_string()))?;
            if !status.is_success() {
                return Err(api_error(status, &text));
            }
            serde_json::from_str::<Value>(&text).map_err(|_| AssistError::MalformedResponse)
        };

        match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
            Ok(result) => result,
            Err(_) => {
                error!("API request timed out after {} seconds.", timeout_secs);
                Err(AssistError::Timeout { seconds: timeout_secs })
            }
        }
    }
}

fn extract_content(body: Value) -> Result<String, AssistError> {
    let parsed: ChatResponse = serde_json::from_value(body).map_err(|_| AssistError::MalformedResponse)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(AssistError::MalformedResponse)
}

fn api_error(status: reqwest::StatusCode, body: &str) -> AssistError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown status").to_string());
    AssistError::Api { status: status.as_u16(), message }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
