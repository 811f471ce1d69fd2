// src/pipeline/copywriter.rs
use crate::errors::{GenerationStage, VitrineError};
use crate::models::{GeneratedTitles, VideoScenePlan};
use crate::pipeline::{prompts, require_filled, strip_code_fences};
use crate::services::{GenerationService, TextRequest};
use log::info;
use serde_json::{Value, json};
use std::sync::Arc;

/// Marketplace titles, product descriptions and narration scripts.
pub struct Copywriter {
    service: Arc<dyn GenerationService>,
}

impl Copywriter {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    pub async fn generate_titles(
        &self,
        current_title: &str,
        brand: &str,
        model: &str,
        characteristics: &str,
    ) -> Result<GeneratedTitles, VitrineError> {
        require_filled(&[
            ("current title", current_title),
            ("brand", brand),
            ("model", model),
            ("characteristics", characteristics),
        ])?;

        let prompt = prompts::title_prompt(current_title, brand, model, characteristics);
        let value = self
            .service
            .generate_structured_text("", &[], &prompt, &title_schema())
            .await
            .map_err(|e| VitrineError::generation(GenerationStage::Title, e))?;

        let titles = parse_titles(value).map_err(|e| VitrineError::generation(GenerationStage::Title, e))?;
        info!(
            "Generated {} Mercado Livre and {} Shopee titles",
            titles.mercado_livre.len(),
            titles.shopee.len()
        );
        Ok(titles)
    }

    pub async fn generate_description(
        &self,
        product_title: &str,
        model_description: &str,
    ) -> Result<String, VitrineError> {
        require_filled(&[
            ("product title", product_title),
            ("model description", model_description),
        ])?;

        let prompt = prompts::description_prompt(product_title, model_description);
        let text = self
            .service
            .generate_text(TextRequest::new(&prompt).with_web_search())
            .await
            .map_err(|e| VitrineError::generation(GenerationStage::Description, e))?;

        non_empty(text, GenerationStage::Description)
    }

    pub async fn generate_audio_script(&self, plan: &VideoScenePlan) -> Result<String, VitrineError> {
        let prompt = prompts::audio_script_prompt(plan.scenes());
        let text = self
            .service
            .generate_text(TextRequest::new(&prompt))
            .await
            .map_err(|e| VitrineError::generation(GenerationStage::AudioScript, e))?;

        non_empty(text, GenerationStage::AudioScript)
    }
}

pub fn title_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "mercadoLivre": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "5 optimized titles for Mercado Livre (max 60 characters each)."
            },
            "shopee": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "5 optimized titles for Shopee (max 100 characters each)."
            }
        },
        "required": ["mercadoLivre", "shopee"]
    })
}

/// Accepts the structured value directly, or a string holding (possibly
/// fenced) JSON.
pub fn parse_titles(value: Value) -> Result<GeneratedTitles, String> {
    let value = match value {
        Value::String(text) => serde_json::from_str(strip_code_fences(&text))
            .map_err(|e| format!("titles are not valid JSON: {}", e))?,
        other => other,
    };

    serde_json::from_value(value).map_err(|e| format!("unexpected titles shape: {}", e))
}

fn non_empty(text: String, stage: GenerationStage) -> Result<String, VitrineError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(VitrineError::generation(stage, "provider returned empty text"));
    }
    Ok(trimmed.to_string())
}
