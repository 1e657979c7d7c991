//! Offline tests for brandscan-db pool configuration and row types.
//! These tests do not require a live database connection.

use brandscan_core::{Environment, JobState, ManagerConfig};
use brandscan_db::{PoolConfig, ScanCompletion, ScanJobRow};
use chrono::Utc;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

fn manager_config() -> ManagerConfig {
    ManagerConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8081),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        dispatch_endpoint_id: 9,
        callback_endpoint_id: 8,
        dispatch_timeout_secs: 30,
        sendgrid_api_key: None,
        alert_to: None,
        alert_cc: None,
        alert_from: "alerts@brandscan.local".to_string(),
    }
}

fn row(status: &str) -> ScanJobRow {
    ScanJobRow {
        id: 1,
        brand_id: "229".to_string(),
        scan_url: Some("https://www.gucci.com".to_string()),
        status: status.to_string(),
        run_code: None,
        parsing_result_url: None,
        parsing_log_url: None,
        parsing_count: None,
        parsing_start: None,
        parsing_end: None,
        dispatched_at: None,
        error_message: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn pool_config_from_manager_config_uses_its_values() {
    let pool_config = PoolConfig::from_manager_config(&manager_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn scan_job_row_maps_to_domain_job() {
    let job = row("dispatched").to_scan_job().unwrap();
    assert_eq!(job.job_id, 1);
    assert_eq!(job.brand_id, "229");
    assert_eq!(job.state, JobState::Dispatched);
}

#[test]
fn scan_job_row_with_unknown_status_has_no_state() {
    assert!(row("running").state().is_none());
    assert!(row("running").to_scan_job().is_none());
}

#[test]
fn scan_completion_defaults_to_empty_result() {
    let completion = ScanCompletion::default();
    assert!(completion.result_url.is_empty());
    assert_eq!(completion.count, 0);
    assert!(completion.started_at.is_none());
}
