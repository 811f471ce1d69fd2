// src/services/mod.rs
pub mod gemini_service;
pub mod image_processor;

pub use gemini_service::GeminiService;
pub use image_processor::ImageProcessor;

use crate::errors::VitrineError;
use crate::models::{ReferenceImage, VideoJobHandle};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

/// Plain text completion request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRequest<'a> {
    pub prompt: &'a str,
    pub images: &'a [ReferenceImage],
    /// Let the provider ground the answer with web search.
    pub web_search: bool,
    /// Ask for a JSON body without pinning a schema.
    pub json_response: bool,
}

impl<'a> TextRequest<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            ..Default::default()
        }
    }

    pub fn with_images(mut self, images: &'a [ReferenceImage]) -> Self {
        self.images = images;
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// Everything the pipeline needs from a generative-AI provider.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate_text(&self, request: TextRequest<'_>) -> Result<String, VitrineError>;

    async fn generate_structured_text(
        &self,
        system_instruction: &str,
        images: &[ReferenceImage],
        content: &str,
        schema: &Value,
    ) -> Result<Value, VitrineError>;

    /// Returns the raw encoded image, or fails if the provider sent none.
    async fn generate_image(
        &self,
        reference_images: &[ReferenceImage],
        prompt: &str,
    ) -> Result<Bytes, VitrineError>;

    async fn submit_video_job(
        &self,
        prompt: &str,
        seed_image: Option<&ReferenceImage>,
    ) -> Result<VideoJobHandle, VitrineError>;

    async fn poll_video_job(&self, handle: &VideoJobHandle) -> Result<VideoJobHandle, VitrineError>;

    async fn fetch_media(&self, locator: &str) -> Result<Bytes, VitrineError>;

    fn provider_name(&self) -> &str;
}

/// Synchronous transform applied to every generated image before display.
pub trait ImagePostProcessor: Send + Sync {
    fn normalize(&self, raw: &[u8]) -> Result<Bytes, VitrineError>;
}
