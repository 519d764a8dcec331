//! HTTP surface for the bakery assistant.
//!
//! This module exposes a compact Axum router with two endpoints:
//!
//! - `POST /predict` – Run the full three-stage pipeline for a question and return the
//!   combined text report. Accepts an optional `slider` field kept for client
//!   compatibility; its value is ignored.
//! - `GET /metrics` – Observe ingestion and query counters.
//!
//! The HTTP surface shares the same pipeline with the interactive REPL, so behavior is
//! identical across interfaces.

use crate::pipeline::{AssistantApi, PipelineError};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Build the HTTP router exposing the prediction surface.
pub fn create_router<S>(assistant: Arc<S>) -> Router
where
    S: AssistantApi + 'static,
{
    Router::new()
        .route("/predict", post(predict::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(assistant)
}

/// Request body for the `POST /predict` endpoint.
#[derive(Deserialize)]
struct PredictRequest {
    /// The question to run through the pipeline.
    text: String,
    /// Accepted for client compatibility; the pipeline does not read it.
    #[serde(default)]
    #[allow(dead_code)]
    slider: Option<f64>,
}

/// Success response for the `POST /predict` endpoint.
#[derive(Serialize)]
struct PredictResponse {
    /// Combined three-section report text.
    answer: String,
    /// Whether retrieval found relevant context for the question.
    context_found: bool,
}

/// Run the pipeline for one question and return the combined report.
async fn predict<S>(
    State(assistant): State<Arc<S>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError>
where
    S: AssistantApi,
{
    let report = assistant.answer(&request.text).await?;
    tracing::info!(
        context_found = report.context.is_found(),
        "Predict request completed"
    );
    Ok(Json(PredictResponse {
        context_found: report.context.is_found(),
        answer: report.render_text(),
    }))
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    documents_indexed: u64,
    chunks_indexed: u64,
    questions_answered: u64,
}

/// Return a concise snapshot of ingestion and query counters.
async fn get_metrics<S>(State(assistant): State<Arc<S>>) -> Json<MetricsResponse>
where
    S: AssistantApi,
{
    let snapshot = assistant.metrics_snapshot();
    Json(MetricsResponse {
        documents_indexed: snapshot.documents_indexed,
        chunks_indexed: snapshot.chunks_indexed,
        questions_answered: snapshot.questions_answered,
    })
}

struct AppError(PipelineError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            PipelineError::EmptyQuestion => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}
