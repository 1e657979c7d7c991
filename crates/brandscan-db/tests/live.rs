//! Live integration tests for brandscan-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/brandscan-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use brandscan_core::JobState;
use brandscan_db::{
    complete_scan_job, fail_scan_job, fetch_endpoint, get_scan_job, health_check,
    insert_scan_job, mark_job_dispatched, mark_job_submitted, upsert_endpoint, DbError,
    ScanCompletion,
};
use chrono::{Duration, Utc};

#[sqlx::test(migrations = "../../migrations")]
async fn scan_job_lifecycle_submitted_to_completed(pool: sqlx::PgPool) {
    insert_scan_job(&pool, 101, "229", Some("https://www.gucci.com"))
        .await
        .expect("insert_scan_job failed");

    mark_job_dispatched(&pool, 101)
        .await
        .expect("mark_job_dispatched failed");
    let dispatched = get_scan_job(&pool, 101).await.unwrap();
    assert_eq!(dispatched.status, "dispatched");
    assert!(dispatched.dispatched_at.is_some());

    let started = Utc::now() - Duration::minutes(5);
    complete_scan_job(
        &pool,
        101,
        &ScanCompletion {
            result_url: "https://blobs.example.com/gucci_output.csv".to_string(),
            log_url: "https://blobs.example.com/gucci.log".to_string(),
            count: 5,
            started_at: Some(started),
            run_code: Some("run-1".to_string()),
        },
    )
    .await
    .expect("complete_scan_job failed");

    let done = get_scan_job(&pool, 101).await.unwrap();
    assert_eq!(done.status, "completed");
    assert_eq!(done.parsing_count, Some(5));
    assert_eq!(done.run_code.as_deref(), Some("run-1"));
    assert_eq!(
        done.parsing_result_url.as_deref(),
        Some("https://blobs.example.com/gucci_output.csv")
    );
    assert!(done.parsing_end.is_some());
    let recorded_start = done.parsing_start.expect("parsing_start set");
    assert!((recorded_start - started).num_seconds().abs() <= 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn completion_without_start_time_falls_back_to_dispatch_time(pool: sqlx::PgPool) {
    insert_scan_job(&pool, 7, "314", None).await.unwrap();
    mark_job_dispatched(&pool, 7).await.unwrap();
    complete_scan_job(&pool, 7, &ScanCompletion::default())
        .await
        .unwrap();

    let done = get_scan_job(&pool, 7).await.unwrap();
    assert_eq!(done.parsing_start, done.dispatched_at);
}

#[sqlx::test(migrations = "../../migrations")]
async fn completing_a_job_that_was_never_dispatched_is_rejected(pool: sqlx::PgPool) {
    insert_scan_job(&pool, 8, "314", None).await.unwrap();
    let err = complete_scan_job(&pool, 8, &ScanCompletion::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidJobTransition { id: 8, .. }));
    assert_eq!(get_scan_job(&pool, 8).await.unwrap().status, "submitted");
}

#[sqlx::test(migrations = "../../migrations")]
async fn completing_an_unknown_job_is_not_found(pool: sqlx::PgPool) {
    let err = complete_scan_job(&pool, 404, &ScanCompletion::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn dispatched_job_can_fail_and_be_resubmitted(pool: sqlx::PgPool) {
    insert_scan_job(&pool, 9, "26", None).await.unwrap();
    mark_job_dispatched(&pool, 9).await.unwrap();

    let err = mark_job_submitted(&pool, 9).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidJobTransition {
            id: 9,
            from: JobState::Dispatched,
            to: JobState::Submitted,
        }
    ));

    fail_scan_job(&pool, 9, "agent returned 500").await.unwrap();
    let failed = get_scan_job(&pool, 9).await.unwrap();
    assert_eq!(failed.status, "failed");
    assert_eq!(failed.error_message.as_deref(), Some("agent returned 500"));

    let resubmitted = mark_job_submitted(&pool, 9).await.unwrap();
    assert_eq!(resubmitted.job_id, 9);
    assert_eq!(resubmitted.state, JobState::Submitted);
    assert!(get_scan_job(&pool, 9).await.unwrap().error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_a_completed_job_is_rejected(pool: sqlx::PgPool) {
    insert_scan_job(&pool, 10, "26", None).await.unwrap();
    mark_job_dispatched(&pool, 10).await.unwrap();
    complete_scan_job(&pool, 10, &ScanCompletion::default())
        .await
        .unwrap();

    let err = fail_scan_job(&pool, 10, "late").await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidJobTransition {
            from: JobState::Completed,
            to: JobState::Failed,
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn endpoint_lookup_strips_trailing_slash(pool: sqlx::PgPool) {
    upsert_endpoint(&pool, 9, "http://agent.internal:8080/")
        .await
        .unwrap();
    assert_eq!(
        fetch_endpoint(&pool, 9).await.unwrap(),
        "http://agent.internal:8080"
    );

    upsert_endpoint(&pool, 9, "http://agent-2.internal:8080")
        .await
        .unwrap();
    assert_eq!(
        fetch_endpoint(&pool, 9).await.unwrap(),
        "http://agent-2.internal:8080"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn missing_endpoint_is_not_found(pool: sqlx::PgPool) {
    assert!(matches!(
        fetch_endpoint(&pool, 1).await.unwrap_err(),
        DbError::NotFound
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn health_check_succeeds_on_live_pool(pool: sqlx::PgPool) {
    health_check(&pool).await.unwrap();
}
