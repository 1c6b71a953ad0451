//! LLM Client: the single point of entry for all generative-AI calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! Pipelines depend on the `ReviewClient` trait; `GeminiClient` is the
//! production implementation.
//!
//! Calls are never retried: callers absorb failures with fallback content.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod parse;
pub mod prompts;

pub use parse::{is_meaningful_question, parse_review, Review};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Review operations the application and messaging pipelines rely on.
///
/// Carried in `AppState` as `Arc<dyn ReviewClient>`.
#[async_trait]
pub trait ReviewClient: Send + Sync {
    /// First-pass review of a resume against a job description.
    async fn review(&self, job_description: &str, resume_text: &str) -> Result<Review, LlmError>;

    /// Follow-up review that also weighs the conversation so far.
    async fn review_with_history(
        &self,
        job_description: &str,
        resume_text: &str,
        history: &str,
        prior_question: &str,
    ) -> Result<Review, LlmError>;

    /// Free-form exchange outside any job context.
    async fn converse(&self, message: &str) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    fn from_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// The model's raw reply: `candidates[0].content.parts[0].text`.
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini client
// ────────────────────────────────────────────────────────────────────────────

/// Gemini `generateContent` client. The API key travels as the `key` query parameter.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String, endpoint: String, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
            api_key,
        })
    }

    /// Sends one prompt and returns the model's raw text reply.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: GenerateResponse = response.json().await?;
        let text = body.text().ok_or(LlmError::EmptyContent)?;

        debug!(chars = text.len(), "Gemini call succeeded");
        Ok(text.to_string())
    }
}

#[async_trait]
impl ReviewClient for GeminiClient {
    async fn review(&self, job_description: &str, resume_text: &str) -> Result<Review, LlmError> {
        let prompt = prompts::review_prompt(job_description, resume_text);
        let text = self.generate(&prompt).await?;
        Ok(parse_review(&text))
    }

    async fn review_with_history(
        &self,
        job_description: &str,
        resume_text: &str,
        history: &str,
        prior_question: &str,
    ) -> Result<Review, LlmError> {
        let prompt =
            prompts::review_with_history_prompt(job_description, resume_text, history, prior_question);
        let text = self.generate(&prompt).await?;
        Ok(parse_review(&text))
    }

    async fn converse(&self, message: &str) -> Result<String, LlmError> {
        self.generate(&prompts::converse_prompt(message)).await
    }
}
