// src/lib.rs
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod session;

use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::{Copywriter, ImageSetOrchestrator, VideoRenderCoordinator, VideoScriptPlanner};
use crate::services::{GenerationService, ImageProcessor};
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub image_processor: Arc<ImageProcessor>,
    pub image_sets: Arc<ImageSetOrchestrator>,
    pub video_scripts: Arc<VideoScriptPlanner>,
    pub video_renderer: Arc<VideoRenderCoordinator>,
    pub copywriter: Arc<Copywriter>,
}

impl AppState {
    pub fn new(service: Arc<dyn GenerationService>, config: &Config) -> Self {
        let renderer = VideoRenderCoordinator::new(service.clone())
            .with_poll_interval(config.poll_interval)
            .with_max_poll_attempts(config.max_poll_attempts);
        Self::with_renderer(service, renderer)
    }

    pub fn with_renderer(
        service: Arc<dyn GenerationService>,
        renderer: VideoRenderCoordinator,
    ) -> Self {
        let image_processor = Arc::new(ImageProcessor::new());

        Self {
            sessions: Arc::new(SessionStore::new()),
            image_sets: Arc::new(ImageSetOrchestrator::new(
                service.clone(),
                image_processor.clone(),
            )),
            image_processor,
            video_scripts: Arc::new(VideoScriptPlanner::new(service.clone())),
            video_renderer: Arc::new(renderer),
            copywriter: Arc::new(Copywriter::new(service)),
        }
    }
}
