use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{error, info, warn};

use docfields_core::api_types::{ExtractRequest, PreviewRequest, PreviewResponse, ResultEnvelope};
use docfields_core::document::{segment, PageSource, TextUnit};
use docfields_core::error::{DocfieldsError, Result};
use docfields_documents::open_document;
use docfields_extraction::{extractor_for_model, ExtractionPipeline};

use crate::state::AppState;

/// POST /api/extract: run the extraction pipeline over a local document.
///
/// Pipeline failures are reported inside the envelope with HTTP 200; only an
/// unusable model selection is a 400.
pub async fn extract_document(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> impl IntoResponse {
    let model = req
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&state.config.default_model)
        .to_string();

    info!(
        document = %req.document_path,
        model = %model,
        fields = req.fields.len(),
        start_page = req.start_page,
        count = %req.count,
        "Extraction requested"
    );

    let extractor = match extractor_for_model(&state.config, &model) {
        Ok(extractor) => extractor,
        Err(e) => {
            warn!(model = %model, error = %e, "Rejecting extraction request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ResultEnvelope::failed(e.to_string())),
            );
        }
    };

    let document = match load_document(PathBuf::from(&req.document_path)).await {
        Ok(document) => document,
        Err(e) => {
            error!(document = %req.document_path, error = %e, "Failed to open document");
            return (StatusCode::OK, Json(ResultEnvelope::failed(e.to_string())));
        }
    };

    let pipeline = ExtractionPipeline::new(extractor, state.config.pipeline_options());
    let envelope = pipeline
        .run(
            Arc::from(document),
            &req.fields,
            &req.instructions,
            req.start_page,
            req.count,
        )
        .await;

    (StatusCode::OK, Json(envelope))
}

/// POST /api/preview: return the text units a run would send to the model.
pub async fn preview_document(
    State(_state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> impl IntoResponse {
    info!(
        document = %req.document_path,
        start_page = req.start_page,
        count = %req.count,
        "Preview requested"
    );

    let path = PathBuf::from(&req.document_path);
    let (start_page, count) = (req.start_page, req.count);
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<TextUnit>> {
        let document = open_document(&path)?;
        segment(document.as_ref(), start_page, count)
    })
    .await
    .map_err(|e| DocfieldsError::Internal(format!("document task failed: {e}")))
    .and_then(|units| units);

    match result {
        Ok(units) => {
            let total = units.len();
            (StatusCode::OK, Json(PreviewResponse { units, total })).into_response()
        }
        Err(e) => {
            warn!(document = %req.document_path, error = %e, "Preview failed");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Parse the document off the async runtime.
async fn load_document(path: PathBuf) -> Result<Box<dyn PageSource>> {
    tokio::task::spawn_blocking(move || open_document(&path))
        .await
        .map_err(|e| DocfieldsError::Internal(format!("document task failed: {e}")))?
        .map_err(DocfieldsError::from)
}
