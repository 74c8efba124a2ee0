//! Remote LLM classifier
//!
//! Primary classification path: a single non-streaming call to an
//! OpenAI-compatible `/chat/completions` endpoint, with the reply
//! constrained to a fixed JSON verdict schema. Every failure mode
//! (connect error, timeout, non-2xx, unparseable payload, missing fields)
//! surfaces as an [`Error`] value so the dispatcher can fall back.

use crate::classifier::Classifier;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use triage_core::{Category, Classification, Error, Result};

const SYSTEM_PROMPT: &str = "You are a customer support ticket classifier. \
Analyze the given text and respond with a JSON object containing:\n\
1. 'category': exactly one of 'technical', 'billing', or 'general'\n\
   - 'technical': IT issues, software problems, hardware failures, system errors\n\
   - 'billing': payment issues, invoices, charges, refunds, pricing\n\
   - 'general': product inquiries, feature requests, general questions\n\
2. 'confidence': a score between 0.0 and 1.0 indicating classification confidence\n\
3. 'summary': a one-sentence summary of the issue (max 150 characters)\n\n\
Respond ONLY with valid JSON, no additional text.";

/// Configuration for the remote classification backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Backend API base URL (OpenAI-compatible)
    pub api_base: String,

    /// Bearer token for the backend
    pub api_key: String,

    /// Model identifier, also stamped on results as `model_name`
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Response token budget
    pub max_tokens: u32,

    /// Request timeout; expiry is treated as a primary-path failure
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 150,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Chat-completions classifier over the remote backend
pub struct RemoteClassifier {
    name: String,
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteClassifier {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            name: "remote-llm".to_string(),
            client,
            config,
        })
    }

    async fn request_verdict(&self, text: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Classify this ticket: {text}"),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::remote(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::remote(format!("backend returned {status}")));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::remote(format!("invalid completion payload: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::remote("completion contained no content"))?;

        Ok(content)
    }
}

#[async_trait::async_trait]
impl Classifier for RemoteClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let start = Instant::now();

        let content = self.request_verdict(text).await?;
        let classification = parse_verdict(&content, &self.config.model)?;

        Ok(classification.with_processing_time(start.elapsed().as_millis() as u64))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parse the model's JSON verdict into a classification.
///
/// The category label is routed through [`Category::normalize`] and the
/// confidence clamped, so whatever the model emits, the output honors the
/// taxonomy invariants. A missing category or unparseable body is an error
/// (the dispatcher falls back), never a fabricated default.
fn parse_verdict(content: &str, model: &str) -> Result<Classification> {
    let verdict: RemoteVerdict = serde_json::from_str(content.trim())
        .map_err(|e| Error::remote(format!("malformed verdict: {e}")))?;

    Ok(Classification::new(
        Category::normalize(&verdict.category),
        verdict.confidence,
        verdict.summary,
        model,
    ))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// The verdict schema the model is instructed to emit
#[derive(Debug, Deserialize)]
struct RemoteVerdict {
    category: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    summary: Option<String>,
}

fn default_confidence() -> f64 {
    0.7
}
