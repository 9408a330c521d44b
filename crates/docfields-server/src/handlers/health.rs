use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

use docfields_core::api_types::HealthResponse;

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    info!("Health check requested");

    let anthropic_configured = !state.config.anthropic_api_key.is_empty();
    let openai_configured = !state.config.openai_api_key.is_empty();

    let status = if anthropic_configured || openai_configured {
        "ok".to_string()
    } else {
        "degraded".to_string()
    };

    let response = HealthResponse {
        status,
        version: VERSION.to_string(),
        default_model: state.config.default_model.clone(),
        anthropic_configured,
        openai_configured,
    };

    (StatusCode::OK, Json(response))
}
