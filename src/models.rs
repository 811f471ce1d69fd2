// src/models.rs
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::VitrineError;

/// Most reference images the image pipeline accepts.
pub const MAX_IMAGE_REFERENCES: usize = 5;
/// Most reference images the video pipeline accepts.
pub const MAX_VIDEO_REFERENCES: usize = 7;

/// A product photo supplied by the seller.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

impl ReferenceImage {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            content_type: content_type.into(),
            data,
            uploaded_at: Utc::now(),
        }
    }
}

/// Upload metadata returned to clients in place of the raw payload.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSummary {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

impl From<&ReferenceImage> for ReferenceSummary {
    fn from(image: &ReferenceImage) -> Self {
        Self {
            id: image.id,
            filename: image.filename.clone(),
            content_type: image.content_type.clone(),
            size: image.data.len(),
        }
    }
}

/// A candidate usage scene proposed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneProposal {
    pub summary: String,
    #[serde(rename = "detailedPrompt")]
    pub detailed_prompt: String,
}

impl SceneProposal {
    pub fn is_valid(&self) -> bool {
        !self.summary.trim().is_empty() && !self.detailed_prompt.trim().is_empty()
    }
}

/// Named bucket a generated image is shown under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageScene {
    Studio,
    Angle,
    Technical,
    Measurements,
    Usage,
}

impl ImageScene {
    /// Bucket for a position in the prompt plan.
    pub fn for_position(index: usize) -> Self {
        match index {
            0 => ImageScene::Studio,
            1 => ImageScene::Angle,
            2 => ImageScene::Technical,
            3 => ImageScene::Measurements,
            _ => ImageScene::Usage,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageScene::Studio => "Fundo Branco (Estúdio)",
            ImageScene::Angle => "Ângulo do Produto",
            ImageScene::Technical => "Informações Técnicas",
            ImageScene::Measurements => "Tabela de Medidas",
            ImageScene::Usage => "Cenas de Uso",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub index: usize,
    pub prompt: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct ImageGroup {
    pub scene: ImageScene,
    pub images: Vec<GeneratedImage>,
}

/// The finished seven-image batch, grouped by scene.
#[derive(Debug, Clone)]
pub struct ImageSet {
    pub id: Uuid,
    /// Product description the set was generated for. Names the downloads.
    pub subject: String,
    pub groups: Vec<ImageGroup>,
    pub created_at: DateTime<Utc>,
}

impl ImageSet {
    /// Groups images by their plan position. Empty buckets are left out.
    pub fn from_images(images: Vec<GeneratedImage>) -> Self {
        let mut groups: Vec<ImageGroup> = Vec::new();
        for image in images {
            let scene = ImageScene::for_position(image.index);
            match groups.iter_mut().find(|g| g.scene == scene) {
                Some(group) => group.images.push(image),
                None => groups.push(ImageGroup {
                    scene,
                    images: vec![image],
                }),
            }
        }

        Self {
            id: Uuid::new_v4(),
            subject: String::new(),
            groups,
            created_at: Utc::now(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.images.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, scene: ImageScene) -> usize {
        self.groups
            .iter()
            .filter(|g| g.scene == scene)
            .map(|g| g.images.len())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedTitles {
    #[serde(rename = "mercadoLivre")]
    pub mercado_livre: Vec<String>,
    pub shopee: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoScene {
    pub title: String,
    pub prompt: String,
}

/// Six-beat promotional video script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoScenePlan {
    scenes: Vec<VideoScene>,
}

impl VideoScenePlan {
    pub const SCENE_COUNT: usize = 6;

    pub fn scenes(&self) -> &[VideoScene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Replaces the prompt of one scene. Titles are read-only.
    pub fn set_prompt(&mut self, index: usize, prompt: impl Into<String>) -> Result<(), VitrineError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(VitrineError::Validation(
                "Scene prompt cannot be empty".to_string(),
            ));
        }

        let scene = self.scenes.get_mut(index).ok_or_else(|| {
            VitrineError::Validation(format!(
                "Scene index {} out of range (plan has {} scenes)",
                index,
                Self::SCENE_COUNT
            ))
        })?;
        scene.prompt = prompt;
        Ok(())
    }
}

impl TryFrom<Vec<VideoScene>> for VideoScenePlan {
    type Error = String;

    fn try_from(scenes: Vec<VideoScene>) -> Result<Self, Self::Error> {
        if scenes.len() != Self::SCENE_COUNT {
            return Err(format!(
                "expected {} scenes, got {}",
                Self::SCENE_COUNT,
                scenes.len()
            ));
        }
        if let Some(pos) = scenes
            .iter()
            .position(|s| s.title.trim().is_empty() || s.prompt.trim().is_empty())
        {
            return Err(format!("scene {} is missing a title or prompt", pos + 1));
        }
        Ok(Self { scenes })
    }
}

/// Provider-side handle for an in-flight video render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJobHandle {
    pub name: String,
    pub done: bool,
    pub locator: Option<String>,
}

impl VideoJobHandle {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            locator: None,
        }
    }
}

/// Terminal (or not yet started) outcome of one scene's render.
#[derive(Debug, Clone, Default)]
pub enum VideoResult {
    #[default]
    Pending,
    Ready {
        content_type: String,
        media: Bytes,
    },
    Failed {
        reason: String,
    },
}

impl VideoResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, VideoResult::Ready { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, VideoResult::Failed { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            VideoResult::Pending => "pending",
            VideoResult::Ready { .. } => "ready",
            VideoResult::Failed { .. } => "failed",
        }
    }
}
