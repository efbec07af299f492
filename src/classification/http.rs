//! Categorization oracle backed by an OpenAI-compatible chat-completions API

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::money::format_cents;
use crate::settings::OracleSettings;
use crate::traits::{CategorizationOracle, OracleError};
use crate::types::{LedgerError, LedgerResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Low temperature keeps the answer to a bare label
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 10;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Builder for [`ChatCompletionOracle`]
#[derive(Debug, Default)]
pub struct ChatCompletionOracleBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

impl ChatCompletionOracleBuilder {
    pub fn api_key<T: Into<String>>(mut self, key: T) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the API base URL (useful for proxies and tests)
    pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model<T: Into<String>>(mut self, model: T) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn build(self) -> LedgerResult<ChatCompletionOracle> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LedgerError::Configuration("oracle API key is missing".to_string()))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| LedgerError::Configuration(e.to_string()))?;

        Ok(ChatCompletionOracle {
            http,
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Asks a chat model to pick one label among the organization's categories
#[derive(Debug, Clone)]
pub struct ChatCompletionOracle {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatCompletionOracle {
    pub fn builder() -> ChatCompletionOracleBuilder {
        ChatCompletionOracleBuilder::default()
    }

    /// Build from settings; `None` when no API key is configured
    pub fn from_settings(settings: &OracleSettings) -> LedgerResult<Option<Self>> {
        let Some(api_key) = settings.api_key.as_deref() else {
            return Ok(None);
        };
        Self::builder()
            .api_key(api_key)
            .base_url(settings.base_url.as_str())
            .model(settings.model.as_str())
            .build()
            .map(Some)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body<'a>(
        &'a self,
        description: &str,
        amount: i64,
        candidates: &[String],
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(candidates),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Transaction label: \"{description}\". Amount: {} EUR.",
                        format_cents(amount)
                    ),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }
}

fn system_prompt(candidates: &[String]) -> String {
    let mut prompt = String::from(
        "You are the bookkeeper of a student association. Assign the bank \
         transaction to the most relevant category.\n\nAllowed categories:\n",
    );
    for name in candidates {
        prompt.push_str("- ");
        prompt.push_str(name);
        prompt.push('\n');
    }
    prompt.push_str("\nAnswer ONLY with the category name, no sentence, no punctuation.");
    prompt
}

/// Pull the label out of a chat-completions response body
fn extract_label(body: &str) -> Result<Option<String>, OracleError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

    let label = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| {
            content
                .trim()
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
                .trim()
                .to_string()
        })
        .filter(|label| !label.is_empty());

    Ok(label)
}

#[async_trait]
impl CategorizationOracle for ChatCompletionOracle {
    #[tracing::instrument(skip_all, fields(candidates = candidates.len()))]
    async fn suggest(
        &self,
        description: &str,
        amount: i64,
        candidates: &[String],
    ) -> Result<Option<String>, OracleError> {
        let url = format!("{}{COMPLETIONS_PATH}", self.base_url);
        tracing::trace!(url = %url, "sending completion request");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&self.request_body(description, amount, candidates))
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        tracing::debug!(status = %status, "received completion response");

        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        extract_label(&body)
    }
}
