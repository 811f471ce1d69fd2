// src/pipeline/image_set.rs
use crate::errors::{GenerationStage, VitrineError};
use crate::models::{GeneratedImage, ImageSet, MAX_IMAGE_REFERENCES, ReferenceImage, SceneProposal};
use crate::pipeline::{ScenePlanner, require_filled};
use crate::pipeline::prompts;
use crate::services::{GenerationService, ImagePostProcessor};
use bytes::Bytes;
use futures_util::future::try_join_all;
use log::{debug, info};
use std::sync::Arc;

/// Number of images in one batch.
pub const PLAN_SIZE: usize = 7;
/// Slots at the end of the plan filled from scene proposals.
pub const SCENE_SLOTS: usize = 3;

pub const FIXED_PROMPTS: [&str; 4] = [
    prompts::PROMPT_STUDIO,
    prompts::PROMPT_ANGLE,
    prompts::PROMPT_TECHNICAL,
    prompts::PROMPT_MEASUREMENTS,
];

/// The ordered prompts driving one image batch. Always [`PLAN_SIZE`] long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPlan {
    prompts: Vec<String>,
}

impl PromptPlan {
    pub fn from_proposals(proposals: &[SceneProposal]) -> Self {
        let mut prompts: Vec<String> = FIXED_PROMPTS.iter().map(|p| p.to_string()).collect();

        prompts.extend(
            proposals
                .iter()
                .take(SCENE_SLOTS)
                .map(|p| p.detailed_prompt.clone()),
        );
        prompts.resize(PLAN_SIZE, prompts::PROMPT_USAGE_FALLBACK.to_string());

        Self { prompts }
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

/// Plans usage scenes, then generates the seven-image batch.
pub struct ImageSetOrchestrator {
    service: Arc<dyn GenerationService>,
    planner: ScenePlanner,
    post_processor: Arc<dyn ImagePostProcessor>,
}

impl ImageSetOrchestrator {
    pub fn new(
        service: Arc<dyn GenerationService>,
        post_processor: Arc<dyn ImagePostProcessor>,
    ) -> Self {
        Self {
            planner: ScenePlanner::new(service.clone()),
            service,
            post_processor,
        }
    }

    pub async fn build_image_set(
        &self,
        images: &[ReferenceImage],
        description: &str,
        category: &str,
    ) -> Result<ImageSet, VitrineError> {
        validate_references(images)?;
        require_filled(&[("description", description)])?;

        let proposals = self
            .planner
            .propose_scenes(images, description, category)
            .await?;
        let plan = PromptPlan::from_proposals(&proposals);

        info!(
            "Generating {} images ({} from scene proposals)",
            plan.len(),
            proposals.len().min(SCENE_SLOTS)
        );

        let raw_images = self.generate_batch(images, &plan).await?;

        let generated = raw_images
            .iter()
            .zip(plan.prompts())
            .enumerate()
            .map(|(index, (raw, prompt))| {
                Ok(GeneratedImage {
                    index,
                    prompt: prompt.clone(),
                    content_type: "image/jpeg".to_string(),
                    data: self.post_processor.normalize(raw)?,
                })
            })
            .collect::<Result<Vec<_>, VitrineError>>()?;

        Ok(ImageSet::from_images(generated).with_subject(description.trim()))
    }

    /// Issues every plan prompt at once. The result follows plan order, and
    /// the first failure fails the whole batch.
    pub async fn generate_batch(
        &self,
        images: &[ReferenceImage],
        plan: &PromptPlan,
    ) -> Result<Vec<Bytes>, VitrineError> {
        let calls = plan.prompts().iter().enumerate().map(|(index, prompt)| async move {
            let raw = self
                .service
                .generate_image(images, prompt)
                .await
                .map_err(|e| {
                    VitrineError::generation(GenerationStage::Image, format!("slot {}: {}", index, e))
                })?;
            if raw.is_empty() {
                return Err(VitrineError::generation(
                    GenerationStage::Image,
                    format!("slot {}: provider returned no image content", index),
                ));
            }
            debug!("Image slot {} finished ({} bytes)", index, raw.len());
            Ok::<Bytes, VitrineError>(raw)
        });

        try_join_all(calls).await
    }
}

pub(crate) fn validate_references(images: &[ReferenceImage]) -> Result<(), VitrineError> {
    if images.is_empty() {
        return Err(VitrineError::Validation(
            "At least one product image is required".to_string(),
        ));
    }
    if images.len() > MAX_IMAGE_REFERENCES {
        return Err(VitrineError::Validation(format!(
            "At most {} product images are allowed, got {}",
            MAX_IMAGE_REFERENCES,
            images.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposals(k: usize) -> Vec<SceneProposal> {
        (0..k)
            .map(|i| SceneProposal {
                summary: format!("Cena {}", i),
                detailed_prompt: format!("scene prompt {}", i),
            })
            .collect()
    }

    #[test]
    fn plan_always_has_seven_ordered_slots() {
        for k in 0..=5 {
            let plan = PromptPlan::from_proposals(&proposals(k));
            let prompts = plan.prompts();
            assert_eq!(prompts.len(), PLAN_SIZE, "k = {}", k);

            for (slot, fixed) in FIXED_PROMPTS.iter().enumerate() {
                assert_eq!(prompts[slot], *fixed);
            }

            let used = k.min(SCENE_SLOTS);
            for i in 0..used {
                assert_eq!(prompts[4 + i], format!("scene prompt {}", i));
            }
            for prompt in &prompts[4 + used..] {
                assert_eq!(prompt, prompts::PROMPT_USAGE_FALLBACK);
            }
        }
    }

    #[test]
    fn reference_count_is_checked() {
        assert!(matches!(
            validate_references(&[]),
            Err(VitrineError::Validation(_))
        ));

        let six: Vec<_> = (0..6)
            .map(|i| ReferenceImage::new(format!("{}.png", i), "image/png", vec![1]))
            .collect();
        assert!(validate_references(&six).is_err());
        assert!(validate_references(&six[..5]).is_ok());
    }
}
