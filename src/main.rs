// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;

use vitrine::AppState;
use vitrine::config::Config;
use vitrine::handlers;
use vitrine::services::{GeminiService, GenerationService};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Vitrine service...");

    let config = Config::from_env()?;
    let service = Arc::new(GeminiService::new(&config));
    info!(
        "Using {} provider (text: {}, image: {}, video: {})",
        service.provider_name(),
        config.text_model,
        config.image_model,
        config.video_model
    );
    let app_state = AppState::new(service, &config);

    info!(
        "Video jobs poll every {}s ({})",
        config.poll_interval.as_secs(),
        match config.max_poll_attempts {
            Some(max) => format!("giving up after {} attempts", max),
            None => "no attempt limit".to_string(),
        }
    );
    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().limit(1 << 20))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await?;

    Ok(())
}
