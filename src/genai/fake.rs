//! Scriptable generators that count their calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{GenerationError, ImageGenerator, PromptGenerator};
use crate::puzzle::grid::sample_png;

pub struct FakePrompts {
    pub reply: Result<String, u16>,
    pub delay: Duration,
    calls: AtomicUsize,
}

pub struct FakeImages {
    pub reply: Result<Bytes, u16>,
    pub delay: Duration,
    calls: AtomicUsize,
}

impl FakePrompts {
    pub fn replying(prompt: &str) -> Self {
        Self {
            reply: Ok(prompt.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            ..Self::replying("")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FakeImages {
    pub fn png() -> Self {
        Self::replying(Bytes::from(sample_png(16, 16)))
    }

    pub fn replying(bytes: Bytes) -> Self {
        Self {
            reply: Ok(bytes),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            ..Self::replying(Bytes::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn api_error(status: u16) -> GenerationError {
    GenerationError::Api {
        status,
        body: "fake failure".into(),
    }
}

#[async_trait]
impl PromptGenerator for FakePrompts {
    async fn prompt_for_month(&self, _month_name: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reply.clone().map_err(api_error)
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, _prompt: &str) -> Result<Bytes, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reply.clone().map_err(api_error)
    }
}
