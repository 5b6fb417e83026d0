//! Essay feedback: annotated-essay rendering, the widget submission state machine and the
//! HTTP service that brokers submissions to a scoring backend.

pub mod controller;
pub mod feedback;
pub mod schemas;

pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::scoring_backend::HttpScoringBackend;

pub use crate::core::telemetry::init_cli_tracing;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    if !settings.scoring().is_configured() {
        tracing::warn!("SCORING_API_URL is not set; submissions will fail until it is configured");
    }

    let scoring = HttpScoringBackend::from_settings(&settings)?;
    let state = AppState::new(settings, Arc::new(scoring));

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        mode = state.settings().widget().mode.as_str(),
        "Essay feedback API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}
