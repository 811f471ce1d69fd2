// src/session.rs
use crate::errors::VitrineError;
use crate::models::*;
use crate::pipeline::{RenderEvent, SceneRenderState};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Independent kinds of generation request a session can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    ImageSet,
    Titles,
    Description,
    VideoScript,
    VideoRender,
    AudioScript,
}

impl Track {
    pub const ALL: [Track; 6] = [
        Track::ImageSet,
        Track::Titles,
        Track::Description,
        Track::VideoScript,
        Track::VideoRender,
        Track::AudioScript,
    ];
}

/// Which pipeline an uploaded reference image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTrack {
    Images,
    Video,
}

impl ReferenceTrack {
    pub fn limit(&self) -> usize {
        match self {
            ReferenceTrack::Images => MAX_IMAGE_REFERENCES,
            ReferenceTrack::Video => MAX_VIDEO_REFERENCES,
        }
    }
}

/// Identifies one generation request. Completions carrying an epoch that is
/// no longer current belong to a superseded request and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub track: Track,
    pub value: u64,
}

#[derive(Debug, Clone)]
pub struct RenderStatus {
    pub started_at: DateTime<Utc>,
    pub progress: Option<String>,
    pub states: Vec<SceneRenderState>,
    pub results: Vec<VideoResult>,
    pub finished: bool,
}

impl RenderStatus {
    fn new(scene_count: usize) -> Self {
        Self {
            started_at: Utc::now(),
            progress: None,
            states: vec![SceneRenderState::Pending; scene_count],
            results: vec![VideoResult::Pending; scene_count],
            finished: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub image_references: Vec<ReferenceImage>,
    pub video_references: Vec<ReferenceImage>,
    pub image_set: Option<ImageSet>,
    pub titles: Option<GeneratedTitles>,
    pub description: Option<String>,
    pub video_plan: Option<VideoScenePlan>,
    pub render: Option<RenderStatus>,
    pub audio_script: Option<String>,
    epochs: HashMap<Track, u64>,
    // Run still talking to the provider. Outlives reset and new plans.
    active_render: Option<Epoch>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            image_references: Vec::new(),
            video_references: Vec::new(),
            image_set: None,
            titles: None,
            description: None,
            video_plan: None,
            render: None,
            audio_script: None,
            epochs: HashMap::new(),
            active_render: None,
        }
    }

    pub fn current_epoch(&self, track: Track) -> Epoch {
        Epoch {
            track,
            value: self.epochs.get(&track).copied().unwrap_or(0),
        }
    }

    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.current_epoch(epoch.track) == epoch
    }

    fn bump(&mut self, track: Track) -> Epoch {
        let value = self.epochs.entry(track).or_insert(0);
        *value += 1;
        Epoch { track, value: *value }
    }

    pub fn references(&self, track: ReferenceTrack) -> &[ReferenceImage] {
        match track {
            ReferenceTrack::Images => &self.image_references,
            ReferenceTrack::Video => &self.video_references,
        }
    }

    /// A render run is submitting or polling jobs. The plan is locked and no
    /// second run may start until it reports back.
    pub fn render_in_flight(&self) -> bool {
        self.active_render.is_some()
    }

    fn clear_results(&mut self) {
        self.image_set = None;
        self.titles = None;
        self.description = None;
        self.video_plan = None;
        self.render = None;
        self.audio_script = None;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub image_references: usize,
    pub video_references: usize,
    pub has_image_set: bool,
    pub has_video_plan: bool,
}

/// In-memory session state. Nothing outlives the process.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        id
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<_> = sessions
            .values()
            .map(|s| SessionSummary {
                id: s.id,
                created_at: s.created_at,
                image_references: s.image_references.len(),
                video_references: s.video_references.len(),
                has_image_set: s.image_set.is_some(),
                has_video_plan: s.video_plan.is_some(),
            })
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    pub async fn read<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&Session) -> T,
    ) -> Result<T, VitrineError> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(&id).ok_or(VitrineError::SessionNotFound(id))?;
        Ok(f(session))
    }

    pub async fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> Result<T, VitrineError>,
    ) -> Result<T, VitrineError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(VitrineError::SessionNotFound(id))?;
        f(session)
    }

    /// Starts a new request on `track`, superseding any request in flight.
    pub async fn begin(&self, id: Uuid, track: Track) -> Result<Epoch, VitrineError> {
        self.update(id, |session| Ok(session.bump(track))).await
    }

    /// Applies `f` only if `epoch` is still current. Returns whether it ran.
    pub async fn complete(
        &self,
        id: Uuid,
        epoch: Epoch,
        f: impl FnOnce(&mut Session),
    ) -> Result<bool, VitrineError> {
        self.update(id, |session| {
            if !session.is_current(epoch) {
                debug!(
                    "Discarding stale {:?} result for session {} (epoch {})",
                    epoch.track, id, epoch.value
                );
                return Ok(false);
            }
            f(session);
            Ok(true)
        })
        .await
    }

    /// Appends uploads, keeping at most the track's limit. Returns the new count.
    pub async fn add_references(
        &self,
        id: Uuid,
        track: ReferenceTrack,
        images: Vec<ReferenceImage>,
    ) -> Result<usize, VitrineError> {
        self.update(id, |session| {
            let list = match track {
                ReferenceTrack::Images => &mut session.image_references,
                ReferenceTrack::Video => &mut session.video_references,
            };
            list.extend(images);
            list.truncate(track.limit());
            Ok(list.len())
        })
        .await
    }

    pub async fn remove_reference(
        &self,
        id: Uuid,
        track: ReferenceTrack,
        image_id: Uuid,
    ) -> Result<(), VitrineError> {
        self.update(id, |session| {
            let list = match track {
                ReferenceTrack::Images => &mut session.image_references,
                ReferenceTrack::Video => &mut session.video_references,
            };
            let before = list.len();
            list.retain(|image| image.id != image_id);
            if list.len() == before {
                return Err(VitrineError::NotFound(format!("reference image {}", image_id)));
            }
            Ok(())
        })
        .await
    }

    /// Stores a fresh video plan; any previous render belongs to the old plan.
    pub async fn store_video_plan(
        &self,
        id: Uuid,
        epoch: Epoch,
        plan: VideoScenePlan,
    ) -> Result<bool, VitrineError> {
        self.update(id, |session| {
            if !session.is_current(epoch) {
                return Ok(false);
            }
            session.bump(Track::VideoRender);
            session.render = None;
            session.audio_script = None;
            session.video_plan = Some(plan);
            Ok(true)
        })
        .await
    }

    pub async fn edit_scene_prompt(
        &self,
        id: Uuid,
        index: usize,
        prompt: String,
    ) -> Result<VideoScenePlan, VitrineError> {
        self.update(id, |session| {
            if session.render_in_flight() {
                return Err(VitrineError::Validation(
                    "Scene prompts cannot be edited while a render is running".to_string(),
                ));
            }
            let plan = session
                .video_plan
                .as_mut()
                .ok_or_else(|| VitrineError::NotFound("video plan".to_string()))?;
            plan.set_prompt(index, prompt)?;
            Ok(plan.clone())
        })
        .await
    }

    /// Locks the plan and opens a render run. Returns the run's epoch and
    /// the inputs it renders.
    pub async fn begin_render(
        &self,
        id: Uuid,
    ) -> Result<(Epoch, VideoScenePlan, Vec<ReferenceImage>), VitrineError> {
        self.update(id, |session| {
            let plan = session
                .video_plan
                .clone()
                .ok_or_else(|| VitrineError::NotFound("video plan".to_string()))?;
            if session.render_in_flight() {
                return Err(VitrineError::Validation(
                    "A video render is already running".to_string(),
                ));
            }
            let epoch = session.bump(Track::VideoRender);
            session.active_render = Some(epoch);
            session.render = Some(RenderStatus::new(plan.len()));
            Ok((epoch, plan, session.video_references.clone()))
        })
        .await
    }

    /// Single writer for render progress.
    pub async fn apply_render_event(
        &self,
        id: Uuid,
        epoch: Epoch,
        event: RenderEvent,
    ) -> Result<bool, VitrineError> {
        self.complete(id, epoch, |session| {
            let Some(render) = session.render.as_mut() else {
                return;
            };
            match event {
                RenderEvent::Progress { message, .. } => render.progress = Some(message),
                RenderEvent::Transition { index, state } => {
                    if let Some(slot) = render.states.get_mut(index) {
                        *slot = state;
                    }
                }
                RenderEvent::Finished { index, result } => {
                    if let Some(slot) = render.results.get_mut(index) {
                        *slot = result;
                    }
                }
            }
        })
        .await
    }

    /// Closes the run opened by `begin_render`. The results are kept only
    /// if no newer plan, run or reset has superseded it.
    pub async fn finish_render(
        &self,
        id: Uuid,
        epoch: Epoch,
        results: Vec<VideoResult>,
    ) -> Result<bool, VitrineError> {
        self.update(id, |session| {
            if session.active_render == Some(epoch) {
                session.active_render = None;
            }
            if !session.is_current(epoch) {
                debug!("Discarding superseded render results for session {}", id);
                return Ok(false);
            }
            if let Some(render) = session.render.as_mut() {
                render.results = results;
                render.progress = None;
                render.finished = true;
            }
            Ok(true)
        })
        .await
    }

    /// Drops every result and invalidates all in-flight requests. Uploaded
    /// references are cleared too.
    pub async fn reset(&self, id: Uuid) -> Result<(), VitrineError> {
        self.update(id, |session| {
            for track in Track::ALL {
                session.bump(track);
            }
            session.clear_results();
            session.image_references.clear();
            session.video_references.clear();
            Ok(())
        })
        .await
    }
}
