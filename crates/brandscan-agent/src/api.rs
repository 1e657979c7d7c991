//! Agent HTTP surface. Job endpoints only validate and enqueue; the scan runs
//! in its own task and reports back through the completion callback.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use brandscan_core::JobDispatch;
use brandscan_scraper::JobRuntime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::Span;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<JobRuntime>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ResponseMeta {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    fn validation(request_id: &RequestId, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: "validation_error".to_string(),
                message: message.into(),
            },
            meta: ResponseMeta::new(id_text(request_id)),
        }
    }
}

fn id_text(request_id: &RequestId) -> String {
    request_id
        .header_value()
        .to_str()
        .unwrap_or_default()
        .to_string()
}

/// Every job task spawned by a handler is a child of this span, so the job's
/// events carry the request id of the dispatch that started it.
fn request_span(req: &Request<Body>) -> Span {
    let request_id = req.extensions().get::<RequestId>().map(id_text);
    tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri().path(),
        request_id = %request_id.as_deref().unwrap_or("-"),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunQuery {
    job_id: Option<String>,
    brand_id: Option<String>,
    send_out_endpoint_local: Option<String>,
    scan_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    strategies: usize,
}

fn required(req_id: &RequestId, name: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(req_id, format!("{name} is required")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/run_parser", post(run_job))
        .route("/run_html", post(run_job))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

async fn run_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let dispatch = JobDispatch {
        job_id: required(&req_id, "job_id", query.job_id)?,
        brand_id: required(&req_id, "brand_id", query.brand_id)?,
        scan_url: non_empty(query.scan_url),
        callback_endpoint: non_empty(query.send_out_endpoint_local),
    };

    if dispatch.callback_endpoint.is_none() {
        tracing::warn!(job_id = %dispatch.job_id, "no send_out_endpoint_local; completion will not be reported");
    }
    tracing::info!(
        job_id = %dispatch.job_id,
        brand_id = %dispatch.brand_id,
        "job accepted"
    );
    drop(state.runtime.spawn(dispatch));

    Ok((
        StatusCode::ACCEPTED,
        Json(Message {
            message: "Parser task started in the background",
        }),
    ))
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    Json(ApiResponse {
        data: HealthData {
            status: "ok",
            strategies: state.runtime.registry().entries().count(),
        },
        meta: ResponseMeta::new(id_text(&req_id)),
    })
}
