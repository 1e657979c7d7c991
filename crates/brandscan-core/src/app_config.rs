use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How the row count sent back to the Manager is derived from the dataset length.
///
/// `Legacy` reproduces the historical `len - 1` value (floored at zero) that
/// downstream reports were built against; `Exact` reports the true length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountConvention {
    #[default]
    Legacy,
    Exact,
}

impl CountConvention {
    /// Applies the convention to a dataset length.
    #[must_use]
    pub fn apply(self, len: usize) -> i64 {
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        match self {
            CountConvention::Legacy => (len - 1).max(0),
            CountConvention::Exact => len,
        }
    }
}

impl std::fmt::Display for CountConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountConvention::Legacy => write!(f, "legacy"),
            CountConvention::Exact => write!(f, "exact"),
        }
    }
}

/// Where per-brand settings are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsLocation {
    Url(String),
    Path(PathBuf),
}

/// Where published artifacts are uploaded.
#[derive(Clone, PartialEq, Eq)]
pub enum BlobTarget {
    /// Path-addressable HTTP object store; objects are `PUT` to `{endpoint}/{key}`.
    Http {
        endpoint: String,
        public_base: String,
        token: Option<String>,
    },
    /// Local directory, used in development and tests.
    Directory(PathBuf),
}

impl std::fmt::Debug for BlobTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobTarget::Http {
                endpoint,
                public_base,
                token,
            } => f
                .debug_struct("Http")
                .field("endpoint", endpoint)
                .field("public_base", public_base)
                .field("token", &token.as_ref().map(|_| "[redacted]"))
                .finish(),
            BlobTarget::Directory(path) => f.debug_tuple("Directory").field(path).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub settings: SettingsLocation,
    pub work_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub fetch_max_attempts: u32,
    pub fetch_backoff_factor_ms: u64,
    pub inter_request_delay_ms: u64,
    pub render_service_url: Option<String>,
    pub credential_attempts: u32,
    pub blob: BlobTarget,
    pub count_convention: CountConvention,
}

#[derive(Clone)]
pub struct ManagerConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub dispatch_endpoint_id: i32,
    pub callback_endpoint_id: i32,
    pub dispatch_timeout_secs: u64,
    pub sendgrid_api_key: Option<String>,
    pub alert_to: Option<String>,
    pub alert_cc: Option<String>,
    pub alert_from: String,
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("dispatch_endpoint_id", &self.dispatch_endpoint_id)
            .field("callback_endpoint_id", &self.callback_endpoint_id)
            .field("dispatch_timeout_secs", &self.dispatch_timeout_secs)
            .field(
                "sendgrid_api_key",
                &self.sendgrid_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("alert_to", &self.alert_to)
            .field("alert_cc", &self.alert_cc)
            .field("alert_from", &self.alert_from)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_count_is_len_minus_one() {
        assert_eq!(CountConvention::Legacy.apply(6), 5);
        assert_eq!(CountConvention::Legacy.apply(1), 0);
    }

    #[test]
    fn legacy_count_floors_empty_dataset_at_zero() {
        assert_eq!(CountConvention::Legacy.apply(0), 0);
    }

    #[test]
    fn exact_count_is_len() {
        assert_eq!(CountConvention::Exact.apply(6), 6);
        assert_eq!(CountConvention::Exact.apply(0), 0);
    }

    #[test]
    fn blob_target_debug_redacts_token() {
        let target = BlobTarget::Http {
            endpoint: "https://blobs.example.com/archive".to_string(),
            public_base: "https://cdn.example.com/archive".to_string(),
            token: Some("secret-token".to_string()),
        };
        let rendered = format!("{target:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[redacted]"));
    }
}
