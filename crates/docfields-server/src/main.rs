use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod handlers;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("docfields=info".parse().unwrap()),
        )
        .init();

    let config = docfields_core::AppConfig::from_env();
    let host = config.server_host.clone();
    let port = config.server_port;

    if config.anthropic_api_key.is_empty() && config.openai_api_key.is_empty() {
        tracing::warn!("Neither ANTHROPIC_API_KEY nor OPENAI_API_KEY is set; extraction requests will be rejected");
    }

    tracing::info!(
        default_model = %config.default_model,
        concurrency = config.concurrency,
        unit_timeout_secs = config.unit_timeout_secs,
        retry_attempts = config.retry_attempts,
        "Loaded configuration"
    );

    let state = AppState { config };

    let app = routes::create_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{host}:{port}");
    tracing::info!("docfields server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app).await.expect("Server error");
}
