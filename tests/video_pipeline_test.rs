mod test_utils;

use std::sync::Arc;
use std::time::Duration;
use test_utils::{MockGenerationService, VideoScript, reference_images, video_script_json};
use tokio::sync::mpsc;
use tokio::time::Instant;
use vitrine::errors::{GenerationStage, VitrineError};
use vitrine::models::{ReferenceImage, VideoResult, VideoScene, VideoScenePlan};
use vitrine::pipeline::{RenderEvent, SceneRenderState, VideoRenderCoordinator, VideoScriptPlanner};

const INTERVAL: Duration = Duration::from_secs(10);

fn plan() -> VideoScenePlan {
    let scenes: Vec<VideoScene> = (1..=6)
        .map(|i| VideoScene {
            title: format!("Cena {}", i),
            prompt: format!("original prompt for scene {}", i),
        })
        .collect();
    VideoScenePlan::try_from(scenes).unwrap()
}

fn coordinator(mock: &Arc<MockGenerationService>) -> VideoRenderCoordinator {
    VideoRenderCoordinator::new(mock.clone()).with_poll_interval(INTERVAL)
}

fn transitions_for(events: &[RenderEvent], scene: usize) -> Vec<SceneRenderState> {
    events
        .iter()
        .filter_map(|event| match event {
            RenderEvent::Transition { index, state } if *index == scene => Some(*state),
            _ => None,
        })
        .collect()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<RenderEvent>) -> Vec<RenderEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_polling_stops_once_job_reports_done() {
    let mock = Arc::new(
        MockGenerationService::new().with_video_scripts([VideoScript::Succeeds { running_reports: 2 }]),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = Instant::now();
    let results = coordinator(&mock)
        .render_all_with_events(&plan(), &reference_images(1), Some(&tx))
        .await
        .unwrap();
    drop(tx);

    let events = drain(&mut rx);
    assert_eq!(
        transitions_for(&events, 0),
        vec![
            SceneRenderState::Pending,
            SceneRenderState::Submitted,
            SceneRenderState::Polling { attempt: 1 },
            SceneRenderState::Polling { attempt: 2 },
            SceneRenderState::Ready,
        ]
    );
    assert!(results[0].is_ready());

    // Scene 1 polls twice, the other five scenes once each.
    let polls = mock.poll_times();
    assert_eq!(polls.len(), 2 + 5);
    assert!(polls[0] - started >= INTERVAL);
    assert!(polls[1] - polls[0] >= INTERVAL);
    assert!(polls[1] - started < INTERVAL * 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_scene_does_not_stop_later_scenes() {
    let mock = Arc::new(MockGenerationService::new().with_video_scripts([
        VideoScript::Succeeds { running_reports: 1 },
        VideoScript::Succeeds { running_reports: 1 },
        VideoScript::SubmitFails,
        VideoScript::Succeeds { running_reports: 3 },
        VideoScript::PollFails,
        VideoScript::Succeeds { running_reports: 1 },
    ]));

    let results = coordinator(&mock)
        .render_all(&plan(), &reference_images(2))
        .await
        .unwrap();

    // Scenes 4, 5 and 6 were still submitted after scene 3 failed.
    let submitted = mock.submitted_prompts();
    assert_eq!(submitted.len(), 6);
    for (i, prompt) in submitted.iter().enumerate() {
        assert!(prompt.contains(&format!("original prompt for scene {}", i + 1)));
    }

    let statuses: Vec<&str> = results.iter().map(VideoResult::status).collect();
    assert_eq!(
        statuses,
        vec!["ready", "ready", "failed", "ready", "failed", "ready"]
    );
    match &results[2] {
        VideoResult::Failed { reason } => assert!(reason.contains("submission failed")),
        other => panic!("expected failure, got {:?}", other),
    }
    match &results[4] {
        VideoResult::Failed { reason } => assert!(reason.contains("status check failed")),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_render_uses_edited_scene_prompt() {
    let mock = Arc::new(MockGenerationService::new().with_text(video_script_json(6)));
    let planner = VideoScriptPlanner::new(mock.clone());
    let images = reference_images(1);

    let mut plan = planner
        .propose_video_script("Garrafa Térmica Inox 1L", "Mantém a bebida gelada por 24h", &images)
        .await
        .unwrap();
    assert_eq!(plan.len(), 6);

    plan.set_prompt(3, "close-up of the bottle on a gym bench, water drops on the steel")
        .unwrap();

    coordinator(&mock).render_all(&plan, &images).await.unwrap();

    let submitted = mock.submitted_prompts();
    assert!(submitted[3].contains("close-up of the bottle on a gym bench"));
    assert!(!submitted[3].contains("original prompt for scene 4"));
    assert!(submitted[2].contains("original prompt for scene 3"));
}

#[tokio::test(start_paused = true)]
async fn test_first_reference_seeds_every_scene() {
    let mock = Arc::new(MockGenerationService::new());

    coordinator(&mock)
        .render_all(&plan(), &reference_images(3))
        .await
        .unwrap();

    let seeds = mock.submitted_seeds();
    assert_eq!(seeds.len(), 6);
    assert!(seeds.iter().all(|s| s.as_deref() == Some("produto-0.jpg")));
}

#[tokio::test(start_paused = true)]
async fn test_scene_renders_without_reference_images() {
    let mock = Arc::new(MockGenerationService::new());

    let results = coordinator(&mock).render_all(&plan(), &[]).await.unwrap();

    assert!(results.iter().all(VideoResult::is_ready));
    assert!(mock.submitted_seeds().iter().all(Option::is_none));
}

#[tokio::test(start_paused = true)]
async fn test_poll_attempt_limit_fails_hung_scene() {
    let mock = Arc::new(MockGenerationService::new().with_video_scripts([VideoScript::Hangs]));

    let results = coordinator(&mock)
        .with_max_poll_attempts(Some(3))
        .render_all(&plan(), &reference_images(1))
        .await
        .unwrap();

    match &results[0] {
        VideoResult::Failed { reason } => assert!(reason.contains("gave up polling")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(results[1..].iter().all(VideoResult::is_ready));
    assert_eq!(mock.poll_times().len(), 3 + 5);
}

#[tokio::test(start_paused = true)]
async fn test_job_without_locator_or_download_fails_scene() {
    let mock = Arc::new(MockGenerationService::new().with_video_scripts([
        VideoScript::DoneWithoutLocator,
        VideoScript::FetchFails,
    ]));

    let results = coordinator(&mock)
        .render_all(&plan(), &reference_images(1))
        .await
        .unwrap();

    match &results[0] {
        VideoResult::Failed { reason } => assert!(reason.contains("no download locator")),
        other => panic!("expected failure, got {:?}", other),
    }
    match &results[1] {
        VideoResult::Failed { reason } => assert!(reason.contains("download failed")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(mock.fetched().len(), 5);
}

#[tokio::test]
async fn test_too_many_video_references_fail_before_submitting() {
    let mock = Arc::new(MockGenerationService::new());

    let err = coordinator(&mock)
        .render_all(&plan(), &reference_images(8))
        .await
        .unwrap_err();

    assert!(matches!(err, VitrineError::Validation(_)));
    assert!(mock.submitted_prompts().is_empty());
}

#[tokio::test]
async fn test_video_script_with_wrong_scene_count_is_rejected() {
    let mock = Arc::new(MockGenerationService::new().with_text(video_script_json(5)));
    let planner = VideoScriptPlanner::new(mock);

    let err = planner
        .propose_video_script("Mochila", "Mochila impermeável", &reference_images(1))
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(GenerationStage::VideoScript));
}

#[tokio::test]
async fn test_video_script_requires_title_description_and_images() {
    let mock = Arc::new(MockGenerationService::new().with_text(video_script_json(6)));
    let planner = VideoScriptPlanner::new(mock.clone());
    let images = reference_images(1);

    let none: &[ReferenceImage] = &[];
    let cases = [
        ("", "Mochila impermeável", images.as_slice()),
        ("Mochila", "   ", images.as_slice()),
        ("Mochila", "Mochila impermeável", none),
        ("", "   ", none),
    ];
    for (title, description, refs) in cases {
        let err = planner
            .propose_video_script(title, description, refs)
            .await
            .unwrap_err();
        assert!(
            matches!(err, VitrineError::Validation(_)),
            "({:?}, {:?}, {} images) gave {:?}",
            title,
            description,
            refs.len(),
            err
        );
    }

    assert!(mock.text_requests().is_empty());
}
