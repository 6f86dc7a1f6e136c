//! Resolving a month to its puzzle image.
//!
//! A month's image is generated once and stored as [`PART_COUNT`] base64
//! fragments. Later calls reassemble the fragments instead of calling the
//! generative APIs again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64ct::{Base64, Encoding};
use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use super::grid::image_content_type;
use super::month::MonthKey;
use super::repo_types::{JigsawImagePart, PART_COUNT};
use crate::error::Failure;
use crate::genai::{normalize_prompt, GenerationError, ImageGenerator, PromptGenerator};
use crate::store::{DocumentStore, StoreError};

/// A complete image for one month.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub month: MonthKey,
    pub prompt: String,
    pub bytes: Bytes,
    pub content_type: &'static str,
}

pub struct MonthlyImageCache {
    store: Arc<dyn DocumentStore>,
    prompts: Arc<dyn PromptGenerator>,
    images: Arc<dyn ImageGenerator>,
    timeout: Duration,
    generating: Mutex<HashMap<MonthKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl MonthlyImageCache {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        prompts: Arc<dyn PromptGenerator>,
        images: Arc<dyn ImageGenerator>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            prompts,
            images,
            timeout,
            generating: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the month's image, generating and storing it first when no
    /// complete fragment set exists.
    #[instrument(skip_all, fields(month = %month))]
    pub async fn resolve(&self, month: MonthKey) -> Result<ResolvedImage, Failure> {
        if let Some(image) = self.reassemble_stored(month).await? {
            return Ok(image);
        }

        let lock = self.month_lock(month);
        let result = self.resolve_exclusive(month, &lock).await;
        self.release_month_lock(month, lock);
        result
    }

    async fn resolve_exclusive(
        &self,
        month: MonthKey,
        lock: &tokio::sync::Mutex<()>,
    ) -> Result<ResolvedImage, Failure> {
        let _guard = lock.lock().await;

        // another caller may have stored the image while we waited
        if let Some(image) = self.reassemble_stored(month).await? {
            return Ok(image);
        }
        self.generate_and_store(month).await
    }

    fn month_lock(&self, month: MonthKey) -> Arc<tokio::sync::Mutex<()>> {
        self.generating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(month)
            .or_default()
            .clone()
    }

    /// Drops the month's lock entry once no other caller holds or waits on it.
    fn release_month_lock(&self, month: MonthKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut generating = self.generating.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if generating
            .get(&month)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            generating.remove(&month);
        }
    }

    async fn reassemble_stored(&self, month: MonthKey) -> Result<Option<ResolvedImage>, Failure> {
        let parts = self.store.fragments_for_month(&month).await?;
        let found = parts.len();
        let Some((encoded, prompt)) = reassemble(parts) else {
            if found > 0 {
                warn!(found, expected = PART_COUNT, "incomplete fragment set, regenerating");
            }
            return Ok(None);
        };

        let bytes = Base64::decode_vec(&encoded)
            .map_err(|e| StoreError::Corrupt(format!("fragments for {month}: {e}")))?;
        let content_type = image_content_type(&bytes).ok_or_else(|| {
            StoreError::Corrupt(format!("fragments for {month} do not form an image"))
        })?;

        debug!(len = bytes.len(), "image reassembled from fragments");
        Ok(Some(ResolvedImage {
            month,
            prompt,
            bytes: Bytes::from(bytes),
            content_type,
        }))
    }

    async fn generate_and_store(&self, month: MonthKey) -> Result<ResolvedImage, Failure> {
        let raw_prompt = self
            .bounded(self.prompts.prompt_for_month(&month.month_name()))
            .await?;
        let prompt = normalize_prompt(&raw_prompt)
            .ok_or_else(|| GenerationError::Unusable("empty prompt".into()))?;

        let bytes = self.bounded(self.images.generate_image(&prompt)).await?;
        let content_type = image_content_type(&bytes).ok_or_else(|| {
            GenerationError::Unusable("image API returned a non-image payload".into())
        })?;

        let encoded = Base64::encode_string(&bytes);
        let parts: Vec<JigsawImagePart> = split_base64(&encoded, PART_COUNT)
            .into_iter()
            .zip(1..)
            .map(|(chunk, id)| JigsawImagePart {
                id,
                base64_part: chunk.to_string(),
                prompt: prompt.clone(),
                month,
            })
            .collect();
        self.store.write_fragments(&parts).await?;

        info!(%prompt, len = bytes.len(), "monthly image generated and stored");
        Ok(ResolvedImage {
            month,
            prompt,
            bytes,
            content_type,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GenerationError>>,
    ) -> Result<T, GenerationError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))?
    }
}

/// Joined base64 and prompt of a complete fragment set, `None` unless the
/// ids include exactly the run `1..=PART_COUNT`.
pub fn reassemble(mut parts: Vec<JigsawImagePart>) -> Option<(String, String)> {
    if parts.len() < PART_COUNT {
        return None;
    }
    parts.sort_by_key(|p| p.id);
    let run = parts.get(..PART_COUNT)?;
    if run.iter().zip(1u32..).any(|(part, expected)| part.id != expected) {
        return None;
    }
    let prompt = run.first()?.prompt.clone();
    let encoded = run.iter().map(|p| p.base64_part.as_str()).collect();
    Some((encoded, prompt))
}

/// Cuts `encoded` into `parts` contiguous chunks. All chunks but the last
/// have length `len / parts`; the last takes the remainder. Base64 text is
/// ASCII, so every cut falls on a character boundary.
pub fn split_base64(encoded: &str, parts: usize) -> Vec<&str> {
    if parts == 0 {
        return Vec::new();
    }
    let chunk = encoded.len() / parts;
    (0..parts)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == parts { encoded.len() } else { start + chunk };
            &encoded[start..end]
        })
        .collect()
}
