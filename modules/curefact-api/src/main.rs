use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use curefact_analyzer::Analyzer;
use curefact_common::Config;
use ytdlp_client::{MediaResolver, YtDlpResolver};

mod rest;

pub struct AppState {
    pub resolver: Arc<dyn MediaResolver>,
    pub analyzer: Analyzer,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(rest::health))
        .route("/api/fetch-media", post(rest::fetch_media))
        .route("/api/analyze", post(rest::analyze))
        .with_state(state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    config.log_redacted();

    let resolver: Arc<dyn MediaResolver> = Arc::new(YtDlpResolver::new(&config.ytdlp_bin_dir));
    let analyzer = Analyzer::new(&config, resolver.clone());
    let state = Arc::new(AppState { resolver, analyzer });

    let addr = format!("{}:{}", config.host, config.port);
    info!("CureFact relay listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
