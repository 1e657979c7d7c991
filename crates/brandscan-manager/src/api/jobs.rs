use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use brandscan_db::{DbError, ScanCompletion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::send_best_effort;
use crate::middleware::{caller, RequestId};

use super::{ApiError, AppState, Message};

const COMPLETION_ALERT_SUBJECT: &str = "Error - Job Completion";

#[derive(Debug, Deserialize)]
pub(super) struct SubmitJobQuery {
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JobCompleteQuery {
    #[serde(rename = "job_id")]
    job_id: Option<String>,
    result_url: Option<String>,
    log_url: Option<String>,
    count: Option<String>,
    start_time: Option<String>,
    run_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct MethodNotAllowed {
    message: &'static str,
    status: u16,
}

fn parse_i64(req_id: &RequestId, name: &str, value: Option<&str>) -> Result<i64, ApiError> {
    let value = value.ok_or_else(|| {
        ApiError::new(req_id.0.clone(), "validation_error", format!("{name} is required"))
    })?;
    value.trim().parse().map_err(|_| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            format!("{name} must be an integer, got '{value}'"),
        )
    })
}

/// `startTime` is optional; an unparseable value is dropped so the row falls
/// back to `dispatched_at`.
fn parse_start_time(job_id: i64, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.filter(|s| !s.is_empty())?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(job_id, start_time = raw, error = %e, "ignoring unparseable startTime");
            None
        }
    }
}

pub(super) async fn submit_job(
    State(state): State<AppState>,
    req_id: RequestId,
    Query(query): Query<SubmitJobQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_i64(&req_id, "job_id", query.job_id.as_deref())?;

    tracing::info!(job_id, request_id = %req_id.0, "job submitted");
    state.dispatcher.spawn(job_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(Message {
            message: "Job submitted for dispatch in the background",
        }),
    ))
}

pub(super) async fn submit_job_requires_post(headers: HeaderMap) -> impl IntoResponse {
    tracing::info!(caller = %caller(&headers), "GET /submit_job rejected");
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(MethodNotAllowed {
            message: "This endpoint requires POST",
            status: 405,
        }),
    )
}

pub(super) async fn job_complete(
    State(state): State<AppState>,
    req_id: RequestId,
    Query(query): Query<JobCompleteQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_i64(&req_id, "job_id", query.job_id.as_deref())?;
    let count = parse_i64(&req_id, "count", query.count.as_deref())?;

    let completion = ScanCompletion {
        result_url: query.result_url.unwrap_or_default(),
        log_url: query.log_url.unwrap_or_default(),
        count,
        started_at: parse_start_time(job_id, query.start_time.as_deref()),
        run_code: query.run_code.filter(|s| !s.is_empty()),
    };

    match brandscan_db::complete_scan_job(&state.pool, job_id, &completion).await {
        Ok(()) => {
            tracing::info!(job_id, count, result_url = %completion.result_url, "job completed");
        }
        Err(DbError::NotFound) => {
            tracing::warn!(job_id, "completion received for unknown job");
        }
        Err(DbError::InvalidJobTransition { from, .. }) => {
            tracing::warn!(job_id, state = %from, "completion ignored: job is not dispatched");
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "failed to record job completion");
            send_best_effort(
                state.dispatcher.alerter(),
                COMPLETION_ALERT_SUBJECT,
                &format!("Completion for job id {job_id} could not be saved\n{e}"),
            )
            .await;
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(Message {
            message: "Job completion accepted",
        }),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use brandscan_db::{get_scan_job, insert_scan_job, mark_job_dispatched, upsert_endpoint};
    use chrono::TimeZone;
    use sqlx::PgPool;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::tests::app;
    use crate::test_support::{AGENT_ENDPOINT_ID, CALLBACK_ENDPOINT_ID};

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[test]
    fn start_time_accepts_rfc3339_and_drops_garbage() {
        assert_eq!(
            parse_start_time(1, Some("2026-01-02T03:04:05+00:00")),
            Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap())
        );
        assert_eq!(parse_start_time(1, Some("yesterday")), None);
        assert_eq!(parse_start_time(1, Some("")), None);
        assert_eq!(parse_start_time(1, None), None);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn get_submit_job_is_rejected_with_405(pool: PgPool) {
        let response = app(pool, Arc::default())
            .oneshot(
                Request::builder()
                    .uri("/submit_job?job_id=1")
                    .header("user-agent", "curl/8.5")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"message": "This endpoint requires POST", "status": 405})
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn submit_job_requires_numeric_job_id(pool: PgPool) {
        let response = app(pool, Arc::default())
            .oneshot(post("/submit_job?job_id=abc"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn submit_job_accepts_and_dispatches_in_background(pool: PgPool) {
        let agent = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run_html"))
            .and(query_param("job_id", "201"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&agent)
            .await;
        upsert_endpoint(&pool, AGENT_ENDPOINT_ID, &agent.uri())
            .await
            .unwrap();
        upsert_endpoint(&pool, CALLBACK_ENDPOINT_ID, "http://manager.internal")
            .await
            .unwrap();
        insert_scan_job(&pool, 201, "229", None).await.unwrap();

        let response = app(pool.clone(), Arc::default())
            .oneshot(post("/submit_job?job_id=201"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(body_json(response).await["message"].is_string());

        for _ in 0..100 {
            if !agent.received_requests().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(get_scan_job(&pool, 201).await.unwrap().status, "dispatched");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn job_complete_records_result_on_dispatched_job(pool: PgPool) {
        insert_scan_job(&pool, 301, "229", None).await.unwrap();
        mark_job_dispatched(&pool, 301).await.unwrap();

        let response = app(pool.clone(), Arc::default())
            .oneshot(post(
                "/job_complete?job_id=301\
                 &resultUrl=https%3A%2F%2Fcdn.example.com%2Fgucci_output.csv\
                 &logUrl=https%3A%2F%2Fcdn.example.com%2Fgucci.log\
                 &count=5&startTime=2026-01-02T03%3A04%3A05%2B00%3A00&runCode=abc123",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let row = get_scan_job(&pool, 301).await.unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(
            row.parsing_result_url.as_deref(),
            Some("https://cdn.example.com/gucci_output.csv")
        );
        assert_eq!(
            row.parsing_log_url.as_deref(),
            Some("https://cdn.example.com/gucci.log")
        );
        assert_eq!(row.parsing_count, Some(5));
        assert_eq!(
            row.parsing_start,
            Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap())
        );
        assert_eq!(row.run_code.as_deref(), Some("abc123"));
        assert!(row.parsing_end.is_some());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn job_complete_without_start_time_uses_dispatch_time(pool: PgPool) {
        insert_scan_job(&pool, 302, "478", None).await.unwrap();
        mark_job_dispatched(&pool, 302).await.unwrap();

        let response = app(pool.clone(), Arc::default())
            .oneshot(post("/job_complete?job_id=302&resultUrl=&logUrl=&count=0"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let row = get_scan_job(&pool, 302).await.unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.parsing_count, Some(0));
        assert_eq!(row.parsing_start, row.dispatched_at);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn job_complete_for_unknown_job_is_accepted(pool: PgPool) {
        let alerter = Arc::new(crate::test_support::RecordingAlerter::default());
        let response = app(pool, Arc::clone(&alerter))
            .oneshot(post("/job_complete?job_id=999&resultUrl=x&logUrl=y&count=1"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(alerter.sent().is_empty());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn job_complete_does_not_overwrite_a_submitted_job(pool: PgPool) {
        insert_scan_job(&pool, 303, "229", None).await.unwrap();

        let response = app(pool.clone(), Arc::default())
            .oneshot(post("/job_complete?job_id=303&resultUrl=x&logUrl=y&count=1"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let row = get_scan_job(&pool, 303).await.unwrap();
        assert_eq!(row.status, "submitted");
        assert!(row.parsing_result_url.is_none());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn job_complete_rejects_non_numeric_count(pool: PgPool) {
        let response = app(pool, Arc::default())
            .oneshot(post("/job_complete?job_id=1&count=many"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
