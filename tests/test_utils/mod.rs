//! Scriptable generation service for pipeline tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use vitrine::errors::VitrineError;
use vitrine::models::{ReferenceImage, VideoJobHandle};
use vitrine::services::{GenerationService, ImagePostProcessor, TextRequest};

/// How image generation calls behave.
#[derive(Debug, Clone)]
pub enum ImageBehavior {
    /// Return the prompt's bytes immediately.
    Echo,
    /// Echo, but the n-th issued call sleeps longer the earlier it was
    /// issued, so calls complete in reverse order.
    ReverseCompletion,
    /// Fail any call whose prompt contains the text.
    FailWhenPromptContains(String),
    /// Return a small decodable PNG, for tests that run the real processor.
    Png,
}

/// Scripted lifecycle for one submitted video job.
#[derive(Debug, Clone)]
pub enum VideoScript {
    /// The job reports `done=false` this many times, counting the
    /// submission, then reports done with a locator.
    Succeeds { running_reports: u32 },
    SubmitFails,
    DoneWithoutLocator,
    PollFails,
    FetchFails,
    /// Never finishes.
    Hangs,
}

#[derive(Default)]
struct Recorder {
    structured_calls: usize,
    text_requests: Vec<String>,
    text_web_search: Vec<bool>,
    image_prompts: Vec<String>,
    image_completions: Vec<String>,
    submitted_prompts: Vec<String>,
    submitted_seeds: Vec<Option<String>>,
    poll_times: Vec<Instant>,
    fetched: Vec<String>,
}

pub struct MockGenerationService {
    structured: Mutex<VecDeque<Result<Value, String>>>,
    // Each response is held back for its delay before it is returned.
    texts: Mutex<VecDeque<(Duration, Result<String, String>)>>,
    image_behavior: ImageBehavior,
    video_scripts: Mutex<VecDeque<VideoScript>>,
    // job name -> (polls still pending, script)
    jobs: Mutex<HashMap<String, (u32, VideoScript)>>,
    recorder: Mutex<Recorder>,
}

impl Default for MockGenerationService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self {
            structured: Mutex::new(VecDeque::new()),
            texts: Mutex::new(VecDeque::new()),
            image_behavior: ImageBehavior::Echo,
            video_scripts: Mutex::new(VecDeque::new()),
            jobs: Mutex::new(HashMap::new()),
            recorder: Mutex::new(Recorder::default()),
        }
    }

    pub fn with_structured(self, response: Value) -> Self {
        self.structured.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn with_structured_error(self, message: &str) -> Self {
        self.structured
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_delayed_text(text, Duration::ZERO)
    }

    pub fn with_delayed_text(self, text: impl Into<String>, delay: Duration) -> Self {
        self.texts.lock().unwrap().push_back((delay, Ok(text.into())));
        self
    }

    pub fn with_text_error(self, message: &str) -> Self {
        self.texts
            .lock()
            .unwrap()
            .push_back((Duration::ZERO, Err(message.to_string())));
        self
    }

    pub fn with_image_behavior(mut self, behavior: ImageBehavior) -> Self {
        self.image_behavior = behavior;
        self
    }

    pub fn with_video_scripts(self, scripts: impl IntoIterator<Item = VideoScript>) -> Self {
        self.video_scripts.lock().unwrap().extend(scripts);
        self
    }

    pub fn structured_calls(&self) -> usize {
        self.recorder.lock().unwrap().structured_calls
    }

    pub fn text_requests(&self) -> Vec<String> {
        self.recorder.lock().unwrap().text_requests.clone()
    }

    /// Whether each text request asked for web search, in call order.
    pub fn text_web_search(&self) -> Vec<bool> {
        self.recorder.lock().unwrap().text_web_search.clone()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.recorder.lock().unwrap().image_prompts.clone()
    }

    pub fn image_completions(&self) -> Vec<String> {
        self.recorder.lock().unwrap().image_completions.clone()
    }

    pub fn submitted_prompts(&self) -> Vec<String> {
        self.recorder.lock().unwrap().submitted_prompts.clone()
    }

    pub fn submitted_seeds(&self) -> Vec<Option<String>> {
        self.recorder.lock().unwrap().submitted_seeds.clone()
    }

    pub fn poll_times(&self) -> Vec<Instant> {
        self.recorder.lock().unwrap().poll_times.clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.recorder.lock().unwrap().fetched.clone()
    }

    fn provider_error(message: impl Into<String>) -> VitrineError {
        VitrineError::Provider(message.into())
    }

    fn handle_for(name: &str, pending: u32, script: &VideoScript) -> VideoJobHandle {
        if pending > 0 || matches!(script, VideoScript::Hangs) {
            return VideoJobHandle::pending(name);
        }
        let locator = match script {
            VideoScript::DoneWithoutLocator => None,
            _ => Some(format!("mock://{}", name)),
        };
        VideoJobHandle {
            name: name.to_string(),
            done: true,
            locator,
        }
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn generate_text(&self, request: TextRequest<'_>) -> Result<String, VitrineError> {
        {
            let mut recorder = self.recorder.lock().unwrap();
            recorder.text_requests.push(request.prompt.to_string());
            recorder.text_web_search.push(request.web_search);
        }

        let next = self.texts.lock().unwrap().pop_front();
        let Some((delay, response)) = next else {
            return Err(Self::provider_error("mock text responses exhausted"));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response.map_err(|message| Self::provider_error(message))
    }

    async fn generate_structured_text(
        &self,
        _system_instruction: &str,
        _images: &[ReferenceImage],
        _content: &str,
        _schema: &Value,
    ) -> Result<Value, VitrineError> {
        self.recorder.lock().unwrap().structured_calls += 1;

        match self.structured.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(Self::provider_error(message)),
            None => Err(Self::provider_error("mock structured responses exhausted")),
        }
    }

    async fn generate_image(
        &self,
        _reference_images: &[ReferenceImage],
        prompt: &str,
    ) -> Result<Bytes, VitrineError> {
        let issued = {
            let mut recorder = self.recorder.lock().unwrap();
            recorder.image_prompts.push(prompt.to_string());
            recorder.image_prompts.len() - 1
        };

        match &self.image_behavior {
            ImageBehavior::Echo => {}
            ImageBehavior::ReverseCompletion => {
                let delay = 10 * (8 - issued as u64);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            ImageBehavior::FailWhenPromptContains(needle) => {
                // Let the other calls get going before this one fails.
                tokio::time::sleep(Duration::from_millis(5)).await;
                if prompt.contains(needle.as_str()) {
                    return Err(Self::provider_error("no image content in response"));
                }
            }
            ImageBehavior::Png => {
                self.recorder
                    .lock()
                    .unwrap()
                    .image_completions
                    .push(prompt.to_string());
                return Ok(Bytes::from(png(16, 16)));
            }
        }

        self.recorder
            .lock()
            .unwrap()
            .image_completions
            .push(prompt.to_string());
        Ok(Bytes::copy_from_slice(prompt.as_bytes()))
    }

    async fn submit_video_job(
        &self,
        prompt: &str,
        seed_image: Option<&ReferenceImage>,
    ) -> Result<VideoJobHandle, VitrineError> {
        let index = {
            let mut recorder = self.recorder.lock().unwrap();
            recorder.submitted_prompts.push(prompt.to_string());
            recorder
                .submitted_seeds
                .push(seed_image.map(|image| image.filename.clone()));
            recorder.submitted_prompts.len()
        };

        let script = self
            .video_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(VideoScript::Succeeds { running_reports: 1 });

        if matches!(script, VideoScript::SubmitFails) {
            return Err(Self::provider_error("video quota exceeded"));
        }

        let name = format!("operations/job-{}", index);
        let pending = match script {
            VideoScript::Succeeds { running_reports } => running_reports.max(1),
            _ => 1,
        };
        self.jobs
            .lock()
            .unwrap()
            .insert(name.clone(), (pending, script.clone()));

        Ok(VideoJobHandle::pending(name))
    }

    async fn poll_video_job(&self, handle: &VideoJobHandle) -> Result<VideoJobHandle, VitrineError> {
        self.recorder.lock().unwrap().poll_times.push(Instant::now());

        let mut jobs = self.jobs.lock().unwrap();
        let (pending, script) = jobs
            .get_mut(&handle.name)
            .ok_or_else(|| Self::provider_error("unknown job"))?;

        if matches!(script, VideoScript::PollFails) {
            return Err(Self::provider_error("status endpoint unavailable"));
        }

        *pending = pending.saturating_sub(1);
        Ok(Self::handle_for(&handle.name, *pending, script))
    }

    async fn fetch_media(&self, locator: &str) -> Result<Bytes, VitrineError> {
        self.recorder.lock().unwrap().fetched.push(locator.to_string());

        let name = locator.trim_start_matches("mock://");
        let failing = matches!(
            self.jobs.lock().unwrap().get(name),
            Some((_, VideoScript::FetchFails))
        );
        if failing {
            return Err(Self::provider_error("download forbidden"));
        }
        Ok(Bytes::from(format!("video for {}", name)))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// Keeps generated payloads as they are.
pub struct PassthroughProcessor;

impl ImagePostProcessor for PassthroughProcessor {
    fn normalize(&self, raw: &[u8]) -> Result<Bytes, VitrineError> {
        Ok(Bytes::copy_from_slice(raw))
    }
}

/// Solid-colour PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 90, 200]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

pub fn reference_images(count: usize) -> Vec<ReferenceImage> {
    (0..count)
        .map(|i| ReferenceImage::new(format!("produto-{}.jpg", i), "image/jpeg", vec![0xFF, 0xD8, i as u8]))
        .collect()
}

pub fn scene_proposals(count: usize) -> Value {
    let scenes: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "summary": format!("Cena de uso {}", i),
                "detailedPrompt": format!("usage scene prompt {}", i)
            })
        })
        .collect();
    json!({ "scenes": scenes })
}

pub fn video_script_json(count: usize) -> String {
    let scenes: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "title": format!("Cena {}", i),
                "prompt": format!("original prompt for scene {}", i)
            })
        })
        .collect();
    serde_json::to_string(&scenes).unwrap()
}
