// src/pipeline/scene_planner.rs
use crate::errors::{GenerationStage, VitrineError};
use crate::models::{ReferenceImage, SceneProposal};
use crate::pipeline::prompts;
use crate::services::GenerationService;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Most proposals handed back to callers.
pub const MAX_PROPOSALS: usize = 5;

#[derive(Deserialize)]
struct SceneEnvelope {
    scenes: Vec<Value>,
}

/// Asks the provider for candidate usage scenes for a product.
pub struct ScenePlanner {
    service: Arc<dyn GenerationService>,
}

impl ScenePlanner {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    pub async fn propose_scenes(
        &self,
        images: &[ReferenceImage],
        description: &str,
        category: &str,
    ) -> Result<Vec<SceneProposal>, VitrineError> {
        let instruction = prompts::scene_planner_instruction(description, category);

        let value = self
            .service
            .generate_structured_text(
                &instruction,
                images,
                prompts::SCENE_PLANNER_CONTENT,
                &scene_schema(),
            )
            .await
            .map_err(|e| VitrineError::generation(GenerationStage::Scene, e))?;

        let proposals = parse_proposals(value)
            .map_err(|e| VitrineError::generation(GenerationStage::Scene, e))?;

        info!("Scene planner returned {} usable proposals", proposals.len());
        Ok(proposals)
    }
}

/// Response schema: `{ scenes: [{ summary, detailedPrompt }] }`.
pub fn scene_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "scenes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "summary": {
                            "type": "STRING",
                            "description": "A short, evocative summary of the scene (max 10 words)."
                        },
                        "detailedPrompt": {
                            "type": "STRING",
                            "description": "A highly detailed visual prompt for an image generation model."
                        }
                    },
                    "required": ["summary", "detailedPrompt"]
                }
            }
        },
        "required": ["scenes"]
    })
}

/// Keeps well-formed proposals, drops the rest, caps at [`MAX_PROPOSALS`].
pub fn parse_proposals(value: Value) -> Result<Vec<SceneProposal>, String> {
    let envelope: SceneEnvelope = serde_json::from_value(value)
        .map_err(|e| format!("response is not a scene list: {}", e))?;

    let received = envelope.scenes.len();
    let valid: Vec<SceneProposal> = envelope
        .scenes
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<SceneProposal>(raw).ok())
        .filter(SceneProposal::is_valid)
        .collect();

    if valid.len() < received {
        warn!(
            "Dropped {} malformed scene proposals out of {}",
            received - valid.len(),
            received
        );
    }

    if valid.is_empty() {
        return Err("no valid scene proposals in response".to_string());
    }

    Ok(valid.into_iter().take(MAX_PROPOSALS).collect())
}
