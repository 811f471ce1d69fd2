// src/handlers.rs
use crate::pipeline::SceneRenderState;
use crate::services::image_processor::download_file_name;
use crate::session::{Epoch, ReferenceTrack, Track};
use crate::{AppState, errors::VitrineError, models::*};
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{Error, HttpResponse, web};
use base64::{Engine as _, engine::general_purpose};
use futures_util::TryStreamExt;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Longest side uploads are scaled down to.
const MAX_UPLOAD_SIDE: u32 = 2048;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/sessions", web::post().to(create_session))
            .route("/sessions", web::get().to(list_sessions))
            .route("/sessions/{session_id}/reset", web::post().to(reset_session))
            .route(
                "/sessions/{session_id}/references/{track}",
                web::post().to(upload_references),
            )
            .route(
                "/sessions/{session_id}/references/{track}/{image_id}",
                web::delete().to(remove_reference),
            )
            .route(
                "/sessions/{session_id}/image-set",
                web::post().to(generate_image_set),
            )
            .route(
                "/sessions/{session_id}/image-set/{index}",
                web::get().to(get_image),
            )
            .route("/sessions/{session_id}/titles", web::post().to(generate_titles))
            .route(
                "/sessions/{session_id}/description",
                web::post().to(generate_description),
            )
            .route(
                "/sessions/{session_id}/video/script",
                web::post().to(generate_video_script),
            )
            .route(
                "/sessions/{session_id}/video/script/{index}",
                web::put().to(edit_scene_prompt),
            )
            .route(
                "/sessions/{session_id}/video/render",
                web::post().to(start_video_render),
            )
            .route(
                "/sessions/{session_id}/video/audio-script",
                web::post().to(generate_audio_script),
            )
            .route("/sessions/{session_id}/video", web::get().to(video_status))
            .route("/sessions/{session_id}/video/{index}", web::get().to(get_video)),
    )
    .route("/health", web::get().to(health_check));
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "vitrine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn create_session(data: web::Data<AppState>) -> HttpResponse {
    let session_id = data.sessions.create().await;
    info!("Created session {}", session_id);
    HttpResponse::Created().json(serde_json::json!({ "session_id": session_id }))
}

pub async fn list_sessions(data: web::Data<AppState>) -> HttpResponse {
    let sessions = data.sessions.list().await;
    HttpResponse::Ok().json(serde_json::json!({
        "sessions": sessions,
        "count": sessions.len()
    }))
}

pub async fn reset_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, VitrineError> {
    let session_id = path.into_inner();
    data.sessions.reset(session_id).await?;
    info!("Reset session {}", session_id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn upload_references(
    mut payload: Multipart,
    path: web::Path<(Uuid, ReferenceTrack)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (session_id, track) = path.into_inner();
    let mut uploads = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        let content_disposition = field.content_disposition();
        let filename = content_disposition
            .get_filename()
            .ok_or_else(|| VitrineError::Validation("No filename provided".to_string()))?
            .to_string();

        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut image_data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            image_data.extend_from_slice(&chunk);
        }

        let upload = data
            .image_processor
            .prepare_upload(image_data, MAX_UPLOAD_SIDE)?;
        let content_type = upload
            .content_type
            .map(str::to_string)
            .unwrap_or(content_type);

        uploads.push(ReferenceImage::new(filename, content_type, upload.data));
    }

    if uploads.is_empty() {
        return Err(VitrineError::Validation("No images in upload".to_string()).into());
    }

    let ids: Vec<Uuid> = uploads.iter().map(|image| image.id).collect();
    let total = data
        .sessions
        .add_references(session_id, track, uploads)
        .await?;
    // Uploads past the track limit were dropped.
    let accepted: Vec<ReferenceSummary> = data
        .sessions
        .read(session_id, |s| {
            s.references(track)
                .iter()
                .filter(|image| ids.contains(&image.id))
                .map(ReferenceSummary::from)
                .collect()
        })
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session_id,
        "uploaded_images": accepted,
        "count": total,
        "limit": track.limit()
    })))
}

pub async fn remove_reference(
    path: web::Path<(Uuid, ReferenceTrack, Uuid)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, VitrineError> {
    let (session_id, track, image_id) = path.into_inner();
    data.sessions
        .remove_reference(session_id, track, image_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
pub struct ImageSetRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageView {
    index: usize,
    data_url: String,
}

#[derive(Debug, Serialize)]
struct ImageGroupView {
    scene: ImageScene,
    label: &'static str,
    images: Vec<ImageView>,
}

fn image_set_view(set: &ImageSet) -> serde_json::Value {
    let groups: Vec<ImageGroupView> = set
        .groups
        .iter()
        .map(|group| ImageGroupView {
            scene: group.scene,
            label: group.scene.label(),
            images: group
                .images
                .iter()
                .map(|image| ImageView {
                    index: image.index,
                    data_url: format!(
                        "data:{};base64,{}",
                        image.content_type,
                        general_purpose::STANDARD.encode(&image.data)
                    ),
                })
                .collect(),
        })
        .collect();

    serde_json::json!({
        "id": set.id,
        "groups": groups,
        "count": set.len(),
        "created_at": set.created_at
    })
}

fn superseded(track: Track) -> HttpResponse {
    HttpResponse::Conflict().json(serde_json::json!({
        "error": "Superseded",
        "message": format!("A newer {:?} request replaced this one", track)
    }))
}

async fn begin_with_references(
    data: &AppState,
    session_id: Uuid,
    track: Track,
    references: ReferenceTrack,
) -> Result<(Epoch, Vec<ReferenceImage>), VitrineError> {
    let epoch = data.sessions.begin(session_id, track).await?;
    let images = data
        .sessions
        .read(session_id, |s| s.references(references).to_vec())
        .await?;
    Ok((epoch, images))
}

pub async fn generate_image_set(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<ImageSetRequest>,
) -> Result<HttpResponse, VitrineError> {
    let session_id = path.into_inner();
    let (epoch, images) =
        begin_with_references(&data, session_id, Track::ImageSet, ReferenceTrack::Images).await?;

    let category = body.category.as_deref().unwrap_or("");
    let image_set = data
        .image_sets
        .build_image_set(&images, &body.description, category)
        .await?;

    let view = image_set_view(&image_set);
    let applied = data
        .sessions
        .complete(session_id, epoch, |s| s.image_set = Some(image_set))
        .await?;
    if !applied {
        return Ok(superseded(Track::ImageSet));
    }

    Ok(HttpResponse::Ok().json(view))
}

fn attachment(filename: String) -> ContentDisposition {
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(filename)],
    }
}

/// File name stem for video downloads, taken from the first generated title.
fn download_stem(session: &crate::session::Session) -> String {
    let title = session
        .titles
        .as_ref()
        .and_then(|t| t.mercado_livre.first().or(t.shopee.first()))
        .map(String::as_str)
        .unwrap_or("");
    download_file_name(title)
}

pub async fn get_image(
    path: web::Path<(Uuid, usize)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, VitrineError> {
    let (session_id, index) = path.into_inner();

    let (stem, image) = data
        .sessions
        .read(session_id, |session| {
            session.image_set.as_ref().and_then(|set| {
                let image = set
                    .groups
                    .iter()
                    .flat_map(|g| g.images.iter())
                    .find(|image| image.index == index)
                    .cloned()?;
                Some((download_file_name(&set.subject), image))
            })
        })
        .await?
        .ok_or_else(|| VitrineError::NotFound(format!("image {}", index)))?;

    Ok(HttpResponse::Ok()
        .content_type(image.content_type)
        .insert_header(attachment(format!("{}_{}.jpg", stem, index + 1)))
        .body(image.data))
}

#[derive(Debug, Deserialize)]
pub struct TitlesRequest {
    pub current_title: String,
    pub brand: String,
    pub model: String,
    pub characteristics: String,
}

pub async fn generate_titles(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<TitlesRequest>,
) -> Result<HttpResponse, VitrineError> {
    let session_id = path.into_inner();
    let epoch = data.sessions.begin(session_id, Track::Titles).await?;

    let titles = data
        .copywriter
        .generate_titles(&body.current_title, &body.brand, &body.model, &body.characteristics)
        .await?;

    let response = HttpResponse::Ok().json(&titles);
    let applied = data
        .sessions
        .complete(session_id, epoch, |s| s.titles = Some(titles))
        .await?;
    if !applied {
        return Ok(superseded(Track::Titles));
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct DescriptionRequest {
    pub product_title: String,
    pub model_description: String,
}

pub async fn generate_description(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<DescriptionRequest>,
) -> Result<HttpResponse, VitrineError> {
    let session_id = path.into_inner();
    let epoch = data.sessions.begin(session_id, Track::Description).await?;

    let description = data
        .copywriter
        .generate_description(&body.product_title, &body.model_description)
        .await?;

    let response = HttpResponse::Ok().json(serde_json::json!({ "description": description }));
    let applied = data
        .sessions
        .complete(session_id, epoch, |s| s.description = Some(description))
        .await?;
    if !applied {
        return Ok(superseded(Track::Description));
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct VideoScriptRequest {
    #[serde(default)]
    pub title: String,
    /// Falls back to the session's generated description.
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn generate_video_script(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<VideoScriptRequest>,
) -> Result<HttpResponse, VitrineError> {
    let session_id = path.into_inner();
    let (epoch, images) =
        begin_with_references(&data, session_id, Track::VideoScript, ReferenceTrack::Video)
            .await?;

    let description = match body.description.clone() {
        Some(description) => description,
        None => data
            .sessions
            .read(session_id, |s| s.description.clone().unwrap_or_default())
            .await?,
    };

    let plan = data
        .video_scripts
        .propose_video_script(&body.title, &description, &images)
        .await?;

    let response = HttpResponse::Ok().json(serde_json::json!({ "scenes": plan.scenes() }));
    if !data.sessions.store_video_plan(session_id, epoch, plan).await? {
        return Ok(superseded(Track::VideoScript));
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct ScenePromptEdit {
    pub prompt: String,
}

pub async fn edit_scene_prompt(
    path: web::Path<(Uuid, usize)>,
    data: web::Data<AppState>,
    body: web::Json<ScenePromptEdit>,
) -> Result<HttpResponse, VitrineError> {
    let (session_id, index) = path.into_inner();
    let plan = data
        .sessions
        .edit_scene_prompt(session_id, index, body.into_inner().prompt)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "scenes": plan.scenes() })))
}

pub async fn start_video_render(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, VitrineError> {
    let session_id = path.into_inner();
    let (epoch, plan, images) = data.sessions.begin_render(session_id).await?;
    let scenes = plan.len();

    let state = data.get_ref().clone();
    actix_web::rt::spawn(run_render(state, session_id, epoch, plan, images));

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "session_id": session_id,
        "scenes": scenes,
        "status": "rendering"
    })))
}

/// Drives one render run. Progress flows through a channel to a single
/// writer so the session only ever sees in-order updates from this run.
pub async fn run_render(
    state: AppState,
    session_id: Uuid,
    epoch: Epoch,
    plan: VideoScenePlan,
    images: Vec<ReferenceImage>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let renderer = state.video_renderer.clone();
    let sessions = state.sessions.clone();

    let render = async move {
        let outcome = renderer
            .render_all_with_events(&plan, &images, Some(&tx))
            .await;
        drop(tx);
        outcome.map_err(|e| (e, plan.len()))
    };

    let writer = async {
        while let Some(event) = rx.recv().await {
            if let Err(e) = sessions.apply_render_event(session_id, epoch, event).await {
                warn!("Dropping render update for session {}: {}", session_id, e);
            }
        }
    };

    let (outcome, ()) = tokio::join!(render, writer);

    let results = match outcome {
        Ok(results) => results,
        Err((e, scenes)) => {
            error!("Video render for session {} aborted: {}", session_id, e);
            vec![
                VideoResult::Failed {
                    reason: e.to_string()
                };
                scenes
            ]
        }
    };

    match sessions.finish_render(session_id, epoch, results).await {
        Ok(true) => info!("Video render for session {} complete", session_id),
        Ok(false) => info!("Discarded superseded video render for session {}", session_id),
        Err(e) => warn!("Could not record video render for session {}: {}", session_id, e),
    }
}

#[derive(Debug, Serialize)]
struct SceneStatusView {
    index: usize,
    title: String,
    prompt: String,
    state: SceneRenderState,
    status: &'static str,
    reason: Option<String>,
}

pub async fn video_status(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, VitrineError> {
    let session_id = path.into_inner();

    let status = data
        .sessions
        .read(session_id, |session| {
            let plan = session.video_plan.as_ref()?;
            let render = session.render.as_ref();

            let scenes: Vec<SceneStatusView> = plan
                .scenes()
                .iter()
                .enumerate()
                .map(|(index, scene)| {
                    let result = render.and_then(|r| r.results.get(index));
                    SceneStatusView {
                        index,
                        title: scene.title.clone(),
                        prompt: scene.prompt.clone(),
                        state: render
                            .and_then(|r| r.states.get(index).copied())
                            .unwrap_or(SceneRenderState::Pending),
                        status: result.map(VideoResult::status).unwrap_or("pending"),
                        reason: match result {
                            Some(VideoResult::Failed { reason }) => Some(reason.clone()),
                            _ => None,
                        },
                    }
                })
                .collect();

            Some(serde_json::json!({
                "session_id": session_id,
                "rendering": render.is_some_and(|r| !r.finished),
                "finished": render.is_some_and(|r| r.finished),
                "progress": render.and_then(|r| r.progress.clone()),
                "scenes": scenes
            }))
        })
        .await?
        .ok_or_else(|| VitrineError::NotFound("video plan".to_string()))?;

    Ok(HttpResponse::Ok().json(status))
}

pub async fn get_video(
    path: web::Path<(Uuid, usize)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, VitrineError> {
    let (session_id, index) = path.into_inner();

    let (stem, result) = data
        .sessions
        .read(session_id, |session| {
            let result = session
                .render
                .as_ref()
                .and_then(|r| r.results.get(index).cloned());
            (download_stem(session), result)
        })
        .await?;
    let result = result.ok_or_else(|| VitrineError::NotFound(format!("video scene {}", index)))?;

    match result {
        VideoResult::Ready {
            content_type,
            media,
        } => Ok(HttpResponse::Ok()
            .content_type(content_type)
            .insert_header(attachment(format!("{}_video_{}.mp4", stem, index + 1)))
            .body(media)),
        VideoResult::Failed { reason } => Err(VitrineError::NotFound(format!(
            "video scene {} failed: {}",
            index, reason
        ))),
        VideoResult::Pending => Err(VitrineError::NotFound(format!(
            "video scene {} is not ready yet",
            index
        ))),
    }
}

pub async fn generate_audio_script(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, VitrineError> {
    let session_id = path.into_inner();
    let epoch = data.sessions.begin(session_id, Track::AudioScript).await?;

    let plan = data
        .sessions
        .read(session_id, |s| s.video_plan.clone())
        .await?
        .ok_or_else(|| VitrineError::NotFound("video plan".to_string()))?;

    let script = data.copywriter.generate_audio_script(&plan).await?;

    let response = HttpResponse::Ok().json(serde_json::json!({ "script": script }));
    let applied = data
        .sessions
        .complete(session_id, epoch, |s| s.audio_script = Some(script))
        .await?;
    if !applied {
        return Ok(superseded(Track::AudioScript));
    }
    Ok(response)
}
