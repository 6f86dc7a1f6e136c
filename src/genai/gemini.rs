use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ensure_success, GenerationError, PromptGenerator};
use crate::config::GenAiConfig;

/// Gemini `generateContent` client used for monthly prompts.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateRequest {
    fn for_month(month_name: &str) -> Self {
        let text = format!(
            "Give me a short, descriptive prompt (max 10 words ONLY) for a festival or \
             general occasion celebrated mainly in India or worldwide during the month of {month_name}."
        );
        Self {
            contents: vec![Content {
                parts: vec![TextPart { text }],
            }],
        }
    }
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
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

impl GeminiClient {
    pub fn new(client: reqwest::Client, config: &GenAiConfig) -> Self {
        Self {
            client,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl PromptGenerator for GeminiClient {
    #[instrument(skip(self))]
    async fn prompt_for_month(&self, month_name: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest::for_month(month_name))
            .send()
            .await?;
        let body: GenerateResponse = ensure_success(response).await?.json().await?;

        let text = body
            .first_text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GenerationError::Unusable("no candidates in Gemini response".into()))?;
        debug!(prompt = %text, "gemini prompt generated");
        Ok(text.to_string())
    }
}
