use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{ensure_success, GenerationError, ImageGenerator};
use crate::config::GenAiConfig;

/// ClipDrop text-to-image client.
pub struct ClipdropClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct TextToImageRequest<'a> {
    prompt: &'a str,
}

impl ClipdropClient {
    pub fn new(client: reqwest::Client, config: &GenAiConfig) -> Self {
        Self {
            client,
            url: config.clipdrop_url.clone(),
            api_key: config.clipdrop_api_key.clone(),
        }
    }
}

#[async_trait]
impl ImageGenerator for ClipdropClient {
    #[instrument(skip(self))]
    async fn generate_image(&self, prompt: &str) -> Result<Bytes, GenerationError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&TextToImageRequest { prompt })
            .send()
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(GenerationError::Unusable("no image data received".into()));
        }
        debug!(len = bytes.len(), "clipdrop image received");
        Ok(bytes)
    }
}
