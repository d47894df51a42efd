mod auth;
mod config;
mod middleware;

mod error;
mod models;
mod remote;
mod routes;
mod scheduler;
mod session;
mod slots;
mod validation;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use crate::{config::Config, models::AppState, remote::HttpClinicApi, session::SessionStore};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let api = HttpClinicApi::new(&cfg.api_link, Duration::from_secs(cfg.api_timeout_secs))?;

    let state = AppState {
        api: Arc::new(api),
        sessions: Arc::new(SessionStore::new(cfg.session_ttl_hours)),
    };

    // Browser clients of the portal live on another origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(api = %cfg.api_link, "Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
