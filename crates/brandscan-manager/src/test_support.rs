use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;

use async_trait::async_trait;
use brandscan_core::{Environment, ManagerConfig};

use crate::alert::{AlertError, Alerter};

pub(crate) const AGENT_ENDPOINT_ID: i32 = 9;
pub(crate) const CALLBACK_ENDPOINT_ID: i32 = 8;

pub(crate) fn manager_config() -> ManagerConfig {
    ManagerConfig {
        database_url: "postgres://unused".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        log_level: "debug".to_string(),
        db_max_connections: 2,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
        dispatch_endpoint_id: AGENT_ENDPOINT_ID,
        callback_endpoint_id: CALLBACK_ENDPOINT_ID,
        dispatch_timeout_secs: 5,
        sendgrid_api_key: None,
        alert_to: None,
        alert_cc: None,
        alert_from: "alerts@brandscan.local".to_string(),
    }
}

#[derive(Default)]
pub(crate) struct RecordingAlerter {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingAlerter {
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn send(&self, subject: &str, message: &str) -> Result<(), AlertError> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}
