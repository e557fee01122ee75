//! HTTP surface: `POST /classify`, `GET /` and `GET /health`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::classifier::{Classifier, Label};

const WELCOME: &str = "Welcome to the phishing email classifier. \
POST {\"email_content\": \"...\"} to /classify.";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub result: Label,
    /// The predicted class as a number (0.0 or 1.0); not a probability.
    pub confidence: f64,
}

/// Request-boundary errors, rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Classification failed"),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Build the router. Cross-origin requests are allowed from anywhere.
pub fn classify_routes(classifier: Arc<dyn Classifier>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route("/classify", post(classify))
        .layer(cors)
        .with_state(AppState { classifier })
}

async fn welcome() -> &'static str {
    WELCOME
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "catch-that-phish"
    }))
}

/// POST /classify
///
/// The body is parsed by hand: malformed JSON is a 400 with the same
/// `{"error"}` shape as a missing field.
async fn classify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let payload: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Invalid JSON body"))?;

    let text = payload
        .get("email_content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::BadRequest("No email content provided"))?
        .to_string();

    let classifier = Arc::clone(&state.classifier);
    let label = tokio::task::spawn_blocking(move || classifier.classify(&text))
        .await
        .map_err(|e| {
            error!(error = %e, "Classification task panicked");
            ApiError::Internal
        })?
        .map_err(|e| {
            error!(error = %e, "Error in classify endpoint");
            ApiError::Internal
        })?;

    Ok(Json(ClassifyResponse {
        result: label,
        confidence: label.as_f64(),
    }))
}
