// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Pipeline stage a generation failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Scene,
    Image,
    Title,
    Description,
    VideoScript,
    VideoRender,
    AudioScript,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStage::Scene => "scene",
            GenerationStage::Image => "image",
            GenerationStage::Title => "title",
            GenerationStage::Description => "description",
            GenerationStage::VideoScript => "video script",
            GenerationStage::VideoRender => "video render",
            GenerationStage::AudioScript => "audio script",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum VitrineError {
    #[error("Generation failed at {stage} stage: {message}")]
    Generation {
        stage: GenerationStage,
        message: String,
    },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl VitrineError {
    pub fn generation(stage: GenerationStage, message: impl fmt::Display) -> Self {
        VitrineError::Generation {
            stage,
            message: message.to_string(),
        }
    }

    /// Stage of a generation failure, if this is one.
    pub fn stage(&self) -> Option<GenerationStage> {
        match self {
            VitrineError::Generation { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl ResponseError for VitrineError {
    fn error_response(&self) -> HttpResponse {
        match self {
            VitrineError::Generation { stage, .. } => {
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "Generation failed",
                    "stage": stage,
                    "message": self.to_string()
                }))
            }
            VitrineError::Provider(_) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "error": "AI service error",
                "message": self.to_string()
            })),
            VitrineError::ImageProcessing(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Image processing error",
                    "message": self.to_string()
                }))
            }
            VitrineError::Serialization(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Data processing error",
                    "message": self.to_string()
                }))
            }
            VitrineError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
            VitrineError::Config(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Configuration error",
                    "message": self.to_string()
                }))
            }
            VitrineError::SessionNotFound(_) | VitrineError::NotFound(_) => {
                HttpResponse::NotFound().json(serde_json::json!({
                    "error": "Not found",
                    "message": self.to_string()
                }))
            }
        }
    }
}
