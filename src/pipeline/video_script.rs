// src/pipeline/video_script.rs
use crate::errors::{GenerationStage, VitrineError};
use crate::models::{MAX_VIDEO_REFERENCES, ReferenceImage, VideoScene, VideoScenePlan};
use crate::pipeline::{prompts, require_filled, strip_code_fences};
use crate::services::{GenerationService, TextRequest};
use log::info;
use std::sync::Arc;

/// Writes the six-scene promotional video script.
pub struct VideoScriptPlanner {
    service: Arc<dyn GenerationService>,
}

impl VideoScriptPlanner {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    pub async fn propose_video_script(
        &self,
        title: &str,
        description: &str,
        images: &[ReferenceImage],
    ) -> Result<VideoScenePlan, VitrineError> {
        require_filled(&[("title", title), ("description", description)])?;
        if images.is_empty() {
            return Err(VitrineError::Validation(
                "At least one reference image is required for video".to_string(),
            ));
        }
        if images.len() > MAX_VIDEO_REFERENCES {
            return Err(VitrineError::Validation(format!(
                "At most {} reference images are allowed for video, got {}",
                MAX_VIDEO_REFERENCES,
                images.len()
            )));
        }

        let prompt = prompts::video_script_prompt(title, description);
        let text = self
            .service
            .generate_text(TextRequest::new(&prompt).with_images(images).json())
            .await
            .map_err(|e| VitrineError::generation(GenerationStage::VideoScript, e))?;

        let plan = parse_video_script(&text)
            .map_err(|e| VitrineError::generation(GenerationStage::VideoScript, e))?;

        info!("Video script ready with {} scenes", plan.len());
        Ok(plan)
    }
}

pub fn parse_video_script(text: &str) -> Result<VideoScenePlan, String> {
    let scenes: Vec<VideoScene> = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| format!("response is not an array of scenes: {}", e))?;

    VideoScenePlan::try_from(scenes)
}
