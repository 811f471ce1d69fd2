// src/services/gemini_service.rs
use crate::config::Config;
use crate::errors::VitrineError;
use crate::models::{ReferenceImage, VideoJobHandle};
use crate::pipeline::prompts;
use crate::services::{GenerationService, TextRequest};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use log::debug;
use reqwest::Client;
use serde_json::{Value, json};

/// Gemini REST client backing the generation pipeline.
pub struct GeminiService {
    api_key: String,
    api_base: String,
    text_model: String,
    image_model: String,
    video_model: String,
    client: Client,
}

impl GeminiService {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            video_model: config.video_model.clone(),
            client: Client::new(),
        }
    }

    fn inline_parts(images: &[ReferenceImage]) -> Vec<Value> {
        images
            .iter()
            .map(|image| {
                json!({
                    "inline_data": {
                        "mime_type": image.content_type,
                        "data": general_purpose::STANDARD.encode(&image.data)
                    }
                })
            })
            .collect()
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, VitrineError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| VitrineError::Provider(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VitrineError::Provider(format!("Gemini error: {}", error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| VitrineError::Provider(format!("Failed to parse Gemini response: {}", e)))
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<Value, VitrineError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, model);
        self.post(&url, body).await
    }

    /// Concatenates the text parts of the first candidate.
    fn response_text(result: &Value) -> Result<String, VitrineError> {
        let parts = result["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| VitrineError::Provider("No content in Gemini response".to_string()))?;

        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if text.is_empty() {
            return Err(VitrineError::Provider(
                "No text in Gemini response".to_string(),
            ));
        }
        Ok(text)
    }

    fn operation_handle(operation: &Value) -> Result<VideoJobHandle, VitrineError> {
        let name = operation["name"]
            .as_str()
            .ok_or_else(|| VitrineError::Provider("Video operation has no name".to_string()))?;

        let locator = operation["response"]["generateVideoResponse"]["generatedSamples"][0]
            ["video"]["uri"]
            .as_str()
            .map(|s| s.to_string());

        Ok(VideoJobHandle {
            name: name.to_string(),
            done: operation["done"].as_bool().unwrap_or(false),
            locator,
        })
    }
}

#[async_trait]
impl GenerationService for GeminiService {
    async fn generate_text(&self, request: TextRequest<'_>) -> Result<String, VitrineError> {
        let mut parts = Self::inline_parts(request.images);
        parts.push(json!({ "text": request.prompt }));

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }]
        });
        if request.web_search {
            body["tools"] = json!([{ "google_search": {} }]);
        }
        if request.json_response {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }

        let result = self.generate_content(&self.text_model, &body).await?;
        Self::response_text(&result)
    }

    async fn generate_structured_text(
        &self,
        system_instruction: &str,
        images: &[ReferenceImage],
        content: &str,
        schema: &Value,
    ) -> Result<Value, VitrineError> {
        let mut parts = Self::inline_parts(images);
        parts.push(json!({ "text": content }));

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });
        if !system_instruction.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system_instruction }] });
        }

        let result = self.generate_content(&self.text_model, &body).await?;
        let text = Self::response_text(&result)?;

        serde_json::from_str(text.trim())
            .map_err(|e| VitrineError::Serialization(format!("Structured output is not JSON: {}", e)))
    }

    async fn generate_image(
        &self,
        reference_images: &[ReferenceImage],
        prompt: &str,
    ) -> Result<Bytes, VitrineError> {
        let mut parts = Self::inline_parts(reference_images);
        parts.push(json!({ "text": prompts::image_generation_prompt(prompt) }));

        let body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] }
        });

        let result = self.generate_content(&self.image_model, &body).await?;

        let b64_data = result["candidates"][0]["content"]["parts"]
            .as_array()
            .and_then(|parts| {
                parts.iter().find_map(|p| {
                    p["inlineData"]["data"]
                        .as_str()
                        .or_else(|| p["inline_data"]["data"].as_str())
                })
            })
            .ok_or_else(|| VitrineError::Provider("No image data in response".to_string()))?;

        let image_data = general_purpose::STANDARD
            .decode(b64_data)
            .map_err(|e| VitrineError::Provider(format!("Failed to decode image: {}", e)))?;

        Ok(Bytes::from(image_data))
    }

    async fn submit_video_job(
        &self,
        prompt: &str,
        seed_image: Option<&ReferenceImage>,
    ) -> Result<VideoJobHandle, VitrineError> {
        let mut instance = json!({ "prompt": prompt });
        if let Some(image) = seed_image {
            instance["image"] = json!({
                "bytesBase64Encoded": general_purpose::STANDARD.encode(&image.data),
                "mimeType": image.content_type
            });
        }

        let body = json!({
            "instances": [instance],
            "parameters": { "sampleCount": 1, "aspectRatio": "9:16" }
        });

        let url = format!("{}/models/{}:predictLongRunning", self.api_base, self.video_model);
        let operation = self.post(&url, &body).await?;
        let handle = Self::operation_handle(&operation)?;
        debug!("Submitted video job {}", handle.name);
        Ok(handle)
    }

    async fn poll_video_job(&self, handle: &VideoJobHandle) -> Result<VideoJobHandle, VitrineError> {
        let url = format!("{}/{}", self.api_base, handle.name);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| VitrineError::Provider(format!("Video status request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VitrineError::Provider(format!(
                "Video status error: {}",
                error_text
            )));
        }

        let operation: Value = response.json().await.map_err(|e| {
            VitrineError::Provider(format!("Failed to parse video status: {}", e))
        })?;

        Self::operation_handle(&operation)
    }

    async fn fetch_media(&self, locator: &str) -> Result<Bytes, VitrineError> {
        let response = self
            .client
            .get(locator)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| VitrineError::Provider(format!("Media download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(VitrineError::Provider(format!(
                "Media download returned {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| VitrineError::Provider(format!("Failed to read media body: {}", e)))
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}
