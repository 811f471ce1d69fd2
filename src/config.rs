// src/config.rs
use crate::errors::VitrineError;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_VIDEO_MODEL: &str = "veo-2.0-generate-001";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub bind_addr: String,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub video_model: String,
    pub poll_interval: Duration,
    /// `None` polls a video job until the provider reports it done.
    pub max_poll_attempts: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self, VitrineError> {
        // A missing .env file is fine; the process env still applies.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, VitrineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| VitrineError::Config("GEMINI_API_KEY must be set".to_string()))?;

        let poll_interval = match lookup("VITRINE_POLL_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(parse_number(&raw, "VITRINE_POLL_INTERVAL_SECS")?),
            None => DEFAULT_POLL_INTERVAL,
        };

        let max_poll_attempts = match lookup("VITRINE_MAX_POLL_ATTEMPTS") {
            Some(raw) => Some(parse_number::<u32>(&raw, "VITRINE_MAX_POLL_ATTEMPTS")?),
            None => None,
        };

        Ok(Self {
            api_key,
            bind_addr: lookup("VITRINE_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            api_base: lookup("VITRINE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            text_model: lookup("VITRINE_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: lookup("VITRINE_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            video_model: lookup("VITRINE_VIDEO_MODEL")
                .unwrap_or_else(|| DEFAULT_VIDEO_MODEL.to_string()),
            poll_interval,
            max_poll_attempts,
        })
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T, VitrineError> {
    raw.trim()
        .parse()
        .map_err(|_| VitrineError::Config(format!("{} must be a number, got {:?}", key, raw)))
}
