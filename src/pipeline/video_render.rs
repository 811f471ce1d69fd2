// src/pipeline/video_render.rs
use crate::config::DEFAULT_POLL_INTERVAL;
use crate::errors::{GenerationStage, VitrineError};
use crate::models::{
    MAX_VIDEO_REFERENCES, ReferenceImage, VideoJobHandle, VideoResult, VideoScene, VideoScenePlan,
};
use crate::pipeline::prompts;
use crate::services::GenerationService;
use bytes::Bytes;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle of a single scene's render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SceneRenderState {
    Pending,
    Submitted,
    Polling { attempt: u32 },
    Ready,
    Failed,
}

/// Everything observers learn about a render run, in order.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    Progress {
        index: usize,
        total: usize,
        message: String,
    },
    Transition {
        index: usize,
        state: SceneRenderState,
    },
    Finished {
        index: usize,
        result: VideoResult,
    },
}

/// Renders video scenes one after another, polling each job to completion.
pub struct VideoRenderCoordinator {
    service: Arc<dyn GenerationService>,
    poll_interval: Duration,
    max_poll_attempts: Option<u32>,
}

impl VideoRenderCoordinator {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            service,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Gives up on a job after this many re-polls. Unbounded when `None`.
    pub fn with_max_poll_attempts(mut self, max_poll_attempts: Option<u32>) -> Self {
        self.max_poll_attempts = max_poll_attempts;
        self
    }

    pub async fn render_all(
        &self,
        plan: &VideoScenePlan,
        images: &[ReferenceImage],
    ) -> Result<Vec<VideoResult>, VitrineError> {
        self.render_all_with_events(plan, images, None).await
    }

    /// Scenes run strictly in plan order. A failed scene is recorded and the
    /// run moves on; only invalid input fails the call itself.
    pub async fn render_all_with_events(
        &self,
        plan: &VideoScenePlan,
        images: &[ReferenceImage],
        events: Option<&UnboundedSender<RenderEvent>>,
    ) -> Result<Vec<VideoResult>, VitrineError> {
        if images.len() > MAX_VIDEO_REFERENCES {
            return Err(VitrineError::Validation(format!(
                "At most {} reference images are allowed for video, got {}",
                MAX_VIDEO_REFERENCES,
                images.len()
            )));
        }

        let emit = |event: RenderEvent| {
            if let Some(tx) = events {
                // A dropped receiver only means nobody is watching.
                let _ = tx.send(event);
            }
        };

        let total = plan.len();
        let seed = images.first();
        let mut results = vec![VideoResult::Pending; total];

        for index in 0..total {
            emit(RenderEvent::Transition {
                index,
                state: SceneRenderState::Pending,
            });
        }

        for (index, scene) in plan.scenes().iter().enumerate() {
            let message = format!("Gerando vídeo {} de {}", index + 1, total);
            info!("{}: {}", message, scene.title);
            emit(RenderEvent::Progress {
                index,
                total,
                message,
            });

            let result = match self.render_scene(index, scene, seed, &emit).await {
                Ok(media) => {
                    emit(RenderEvent::Transition {
                        index,
                        state: SceneRenderState::Ready,
                    });
                    VideoResult::Ready {
                        content_type: "video/mp4".to_string(),
                        media,
                    }
                }
                Err(e) => {
                    warn!("Video scene {} failed: {}", index + 1, e);
                    emit(RenderEvent::Transition {
                        index,
                        state: SceneRenderState::Failed,
                    });
                    VideoResult::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            results[index] = result.clone();
            emit(RenderEvent::Finished { index, result });
        }

        let ready = results.iter().filter(|r| r.is_ready()).count();
        info!("Video render finished: {} of {} scenes ready", ready, total);
        Ok(results)
    }

    async fn render_scene<F>(
        &self,
        index: usize,
        scene: &VideoScene,
        seed: Option<&ReferenceImage>,
        emit: &F,
    ) -> Result<Bytes, VitrineError>
    where
        F: Fn(RenderEvent),
    {
        let prompt = prompts::video_job_prompt(scene);
        let mut handle = self
            .service
            .submit_video_job(&prompt, seed)
            .await
            .map_err(|e| render_failure(index, "submission failed", e))?;
        emit(RenderEvent::Transition {
            index,
            state: SceneRenderState::Submitted,
        });

        handle = self.poll_until_done(index, handle, emit).await?;

        let locator = handle.locator.ok_or_else(|| {
            render_failure(index, "job finished without a video", "no download locator")
        })?;

        let media = self
            .service
            .fetch_media(&locator)
            .await
            .map_err(|e| render_failure(index, "download failed", e))?;
        if media.is_empty() {
            return Err(render_failure(index, "download failed", "empty body"));
        }

        Ok(media)
    }

    async fn poll_until_done<F>(
        &self,
        index: usize,
        mut handle: VideoJobHandle,
        emit: &F,
    ) -> Result<VideoJobHandle, VitrineError>
    where
        F: Fn(RenderEvent),
    {
        let mut attempt = 0u32;
        while !handle.done {
            if self.max_poll_attempts.is_some_and(|max| attempt >= max) {
                return Err(render_failure(
                    index,
                    "gave up polling",
                    format!("still running after {} attempts", attempt),
                ));
            }

            attempt += 1;
            emit(RenderEvent::Transition {
                index,
                state: SceneRenderState::Polling { attempt },
            });
            tokio::time::sleep(self.poll_interval).await;

            debug!("Polling video job {} (attempt {})", handle.name, attempt);
            handle = self
                .service
                .poll_video_job(&handle)
                .await
                .map_err(|e| render_failure(index, "status check failed", e))?;
        }
        Ok(handle)
    }
}

fn render_failure(index: usize, what: &str, cause: impl std::fmt::Display) -> VitrineError {
    VitrineError::generation(
        GenerationStage::VideoRender,
        format!("scene {} {}: {}", index + 1, what, cause),
    )
}
