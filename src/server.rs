use crate::app::ports::{LogStore, PayloadStore};
use crate::app::{LogQueryService, PayloadLookupService};
use crate::error::WeatherError;
use crate::observability::metrics;
use axum::{
    extract::{Path, Query},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

const LOGS_FAILURE: &str = "An error occurred while processing your request.";
const PAYLOAD_FAILURE: &str = "Failed to retrieve weather data";

/// Services shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub logs: Arc<LogQueryService>,
    pub payloads: Arc<PayloadLookupService>,
}

impl AppState {
    pub fn new(
        log_store: Arc<dyn LogStore>,
        payload_store: Arc<dyn PayloadStore>,
        city: &str,
    ) -> Self {
        Self {
            logs: Arc::new(LogQueryService::new(log_store.clone(), city)),
            payloads: Arc::new(PayloadLookupService::new(log_store, payload_store, city)),
        }
    }
}

#[derive(Debug)]
pub struct ServerError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ServerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let code = match status {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::NOT_FOUND => "not_found",
            _ => "internal_error",
        };
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Client errors keep their message; anything else is replaced by
    /// `generic` (the cause was already logged where it happened).
    pub fn from_weather(err: WeatherError, generic: &str) -> Self {
        match err {
            WeatherError::InvalidInput(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            WeatherError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, generic),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "weather_ingest",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
struct LogsParams {
    from: Option<String>,
    to: Option<String>,
}

async fn get_logs(
    Extension(state): Extension<AppState>,
    Query(params): Query<LogsParams>,
) -> Response {
    let resp = match state
        .logs
        .query(params.from.as_deref(), params.to.as_deref())
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => ServerError::from_weather(e, LOGS_FAILURE).into_response(),
    };
    metrics::api::request("logs", resp.status().as_u16());
    resp
}

async fn lookup_payload(state: &AppState, id: Option<&str>) -> Response {
    let resp = match state.payloads.lookup(id).await {
        Ok(payload) => (
            [(header::CONTENT_TYPE, payload.content_type)],
            payload.content,
        )
            .into_response(),
        Err(e) => ServerError::from_weather(e, PAYLOAD_FAILURE).into_response(),
    };
    metrics::api::request("payload", resp.status().as_u16());
    resp
}

async fn get_payload(Extension(state): Extension<AppState>, Path(id): Path<String>) -> Response {
    lookup_payload(&state, Some(&id)).await
}

async fn get_payload_without_id(Extension(state): Extension<AppState>) -> Response {
    lookup_payload(&state, None).await
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/logs", get(get_logs))
        .route("/payload", get(get_payload_without_id))
        .route("/payload/", get(get_payload_without_id))
        .route("/payload/:id", get(get_payload))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Serves `router` on `addr` until Ctrl-C.
pub async fn start_server(router: Router, addr: SocketAddr) -> anyhow::Result<()> {
    info!("HTTP server running on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
