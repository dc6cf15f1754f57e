use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{request::Parts, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use url::Url;

use crate::{
    ai::ClassificationEngine,
    domain::{
        validate_content, BatchClassifyRequest, BatchClassifyResponse, ClassificationResult,
        ClassifyRequest, ErrorBody, HealthResponse, HealthStatus, IntentCatalog,
    },
    infrastructure::shutdown::ShutdownListener,
};

use super::batch::{BatchCoordinator, BatchError};

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Clone)]
pub struct AppState {
    engine: Arc<ClassificationEngine>,
    batch: Arc<BatchCoordinator>,
}

impl AppState {
    pub fn new(batch: Arc<BatchCoordinator>) -> Self {
        Self {
            engine: batch.engine().clone(),
            batch,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/classify", post(classify_content))
        .route("/classify/batch", post(classify_batch))
        .route("/intents", get(get_intents))
        .layer(cors_layer())
        .with_state(state)
}

/// Browser extensions and local dev pages call the API with credentials, so the
/// origin is echoed back only when it passes [`is_allowed_origin`].
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _: &Parts| {
                origin.to_str().map(is_allowed_origin).unwrap_or(false)
            },
        ))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Any chrome extension, plus plain http pages on localhost or 127.0.0.1 at any port.
fn is_allowed_origin(origin: &str) -> bool {
    if let Some(id) = origin.strip_prefix("chrome-extension://") {
        return !id.is_empty();
    }
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    url.scheme() == "http"
        && matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"))
        && url.path() == "/"
        && url.query().is_none()
}

pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: ShutdownListener,
) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    tracing::info!(target: "server", %addr, "classification API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.engine.health().await;
    Json(HealthResponse {
        status: if connected {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        },
        backend_connected: connected,
        model: state.engine.model().to_string(),
    })
}

async fn classify_content(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassificationResult>, ApiError> {
    validate_content(&request.content).map_err(|err| unprocessable(err.to_string()))?;

    let result = state.engine.classify(&request.content).await;
    let preview: String = request.content.chars().take(50).collect();
    tracing::debug!(
        target: "server",
        source = request.source.as_deref().unwrap_or("-"),
        intent = %result.intent,
        confidence = result.confidence,
        "classified {preview:?}"
    );
    Ok(Json(result))
}

async fn classify_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchClassifyRequest>,
) -> Result<Json<BatchClassifyResponse>, ApiError> {
    let results = state
        .batch
        .classify_batch(request.items)
        .await
        .map_err(|err: BatchError| unprocessable(err.to_string()))?;
    Ok(Json(BatchClassifyResponse { results }))
}

async fn get_intents(State(state): State<AppState>) -> Json<IntentCatalog> {
    Json(state.engine.catalog().clone())
}

fn unprocessable(message: impl Into<String>) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}
