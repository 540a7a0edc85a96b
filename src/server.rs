//! HTTP API over a [`DocumentTranslator`].
//!
//! | Method | Path | Body |
//! |---|---|---|
//! | POST | `/translate/text` | `{text, target_language, source_language?}` |
//! | POST | `/translate/document` | `{document, target_language, source_language?, fields?, exclude_fields?}` |
//! | POST | `/translate/documents` | `{documents, target_language, source_language?, fields?, exclude_fields?}` |
//! | GET | `/cache/stats` | |
//! | DELETE | `/cache/:source/:target` | |
//! | GET | `/metrics` | |
//! | GET | `/health` | |
//!
//! When an API key is configured, every route except `/health` requires the
//! `X-API-Key` header.

use crate::error::{BackendError, TranslateError};
use crate::record::{FieldSelector, Record};
use crate::security::{api_key_matches, API_KEY_HEADER};
use crate::translator::{DocumentTranslator, TextTranslation};
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

pub struct AppState {
    pub translator: DocumentTranslator,
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(translator: DocumentTranslator, api_key: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            translator,
            api_key,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/translate/text", post(translate_text))
        .route("/translate/document", post(translate_document))
        .route("/translate/documents", post(translate_documents))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/:source/:target", delete(clear_cache))
        .route("/metrics", get(metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": true,
                "message": self.message
            })),
        )
            .into_response()
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        let status = match &err {
            TranslateError::Backend(BackendError::Timeout(_)) | TranslateError::Timeout(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            TranslateError::Backend(_) => StatusCode::BAD_GATEWAY,
            TranslateError::Structural(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TranslateError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Translation request failed: {}", err);
        } else {
            warn!("Translation request rejected: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if !api_key_matches(state.api_key.as_deref(), provided) {
        warn!("Rejected request to {}: invalid API key", request.uri().path());
        return ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid or missing API key".to_string(),
        }
        .into_response();
    }

    next.run(request).await
}

#[derive(Debug, Deserialize)]
struct TextRequest {
    text: String,
    target_language: String,
    #[serde(default)]
    source_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentRequest {
    document: Record,
    target_language: String,
    #[serde(default)]
    source_language: Option<String>,
    #[serde(flatten)]
    selector: FieldSelector,
}

#[derive(Debug, Deserialize)]
struct DocumentsRequest {
    documents: Vec<Record>,
    target_language: String,
    #[serde(default)]
    source_language: Option<String>,
    #[serde(flatten)]
    selector: FieldSelector,
}

async fn health_check() -> &'static str {
    "OK"
}

async fn translate_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TextRequest>,
) -> Result<Json<TextTranslation>, ApiError> {
    let translation = state
        .translator
        .translate_text(
            &request.text,
            &request.target_language,
            request.source_language.as_deref(),
        )
        .await?;
    Ok(Json(translation))
}

async fn translate_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DocumentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let document = state
        .translator
        .translate_document(
            &request.document,
            &request.target_language,
            request.source_language.as_deref(),
            &request.selector,
        )
        .await?;
    Ok(Json(json!({ "document": document })))
}

async fn translate_documents(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DocumentsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let documents = state
        .translator
        .translate_documents(
            &request.documents,
            &request.target_language,
            request.source_language.as_deref(),
            &request.selector,
        )
        .await?;
    Ok(Json(json!({ "documents": documents })))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.translator.cache_stats().await)
}

async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Path((source, target)): Path<(String, String)>,
) -> impl IntoResponse {
    let removed = state.translator.clear_cache(&source, &target).await;
    Json(json!({
        "source_language": source,
        "target_language": target,
        "removed": removed
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.translator.metrics())
}
