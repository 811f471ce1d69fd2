// src/pipeline/mod.rs
pub mod copywriter;
pub mod image_set;
pub mod prompts;
pub mod scene_planner;
pub mod video_render;
pub mod video_script;

pub use copywriter::Copywriter;
pub use image_set::{ImageSetOrchestrator, PromptPlan};
pub use scene_planner::ScenePlanner;
pub use video_render::{RenderEvent, SceneRenderState, VideoRenderCoordinator};
pub use video_script::VideoScriptPlanner;

use crate::errors::VitrineError;

/// Fails with the first field, by name, that is blank.
pub(crate) fn require_filled(fields: &[(&str, &str)]) -> Result<(), VitrineError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(VitrineError::Validation(format!("{} is required", name))),
        None => Ok(()),
    }
}

/// Strips a surrounding markdown code fence (```` ```json ... ``` ````) if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop an optional language tag on the opening fence line.
    let body = match rest.find('\n') {
        Some(pos) if !rest[..pos].trim().contains(['{', '[']) => &rest[pos + 1..],
        _ => rest.trim_start_matches("json"),
    };

    body.trim_end().trim_end_matches("```").trim()
}
