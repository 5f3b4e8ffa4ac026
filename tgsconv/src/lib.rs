//! # tgsconv: first-frame renderer for animated stickers
//!
//! `tgsconv` is a small HTTP service that takes an animated sticker (a Telegram `.tgs` file,
//! which is gzip-compressed Lottie JSON, or plain Lottie JSON), renders its first frame with an
//! external headless-browser renderer, and answers with the PNG.
//!
//! ## Request Flow
//!
//! A `POST /convert` request goes through three steps:
//!
//! 1. The multipart body is searched for the `tgs` file part. No file means `400`.
//! 2. The [`decode`] module gunzips and parses the upload, falling back to parsing it as plain
//!    JSON when it is not gzip.
//! 3. The [`render`] module hands the document to a [`render::RenderEngine`], retrying up to three
//!    times in total, and the resulting artifact from [`storage`] is streamed back. The artifact
//!    is deleted as soon as the response body is dropped.
//!
//! Decoding and rendering failures both surface as `500 {"error": "..."}`; see [`errors`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use tgsconv::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = tgsconv::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     tgsconv::telemetry::init_telemetry(config.log_format)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod decode;
pub mod errors;
mod openapi;
pub mod render;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use openapi::ApiDoc;
use render::{CommandRenderEngine, RenderEngine, RenderSettings, Renderer};
use std::sync::Arc;
use storage::ArtifactStore;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;

/// Application state shared across all request handlers.
///
/// Everything in here is immutable after startup; concurrent requests only share the artifact
/// directory, and they never collide in it because every artifact name is a fresh UUID.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub renderer: Renderer,
}

/// Build the application router.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_size;

    let router = Router::new()
        .route("/health", get(api::handlers::health::health))
        .route(
            "/convert",
            post(api::handlers::convert::convert).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state);

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// The assembled service.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] prepares the artifact directory and the renderer
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create an application rendering through the configured external renderer.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let engine = Arc::new(CommandRenderEngine::new(&config.render));
        Self::with_engine(config, engine).await
    }

    /// Create an application around any render engine.
    pub async fn with_engine(config: Config, engine: Arc<dyn RenderEngine>) -> anyhow::Result<Self> {
        debug!("Starting converter with configuration: {:#?}", config);

        let artifacts = ArtifactStore::new(config.temp_dir.clone());
        artifacts
            .ensure()
            .await
            .with_context(|| format!("Failed to create artifact directory {}", artifacts.root().display()))?;

        let renderer = Renderer::new(engine, artifacts, RenderSettings::from(&config.render));
        let app_state = AppState::builder().config(config.clone()).renderer(renderer).build();
        let router = build_router(app_state);

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "TGS to PNG conversion service listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
