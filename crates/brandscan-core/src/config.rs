use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::app_config::{
    AgentConfig, BlobTarget, CountConvention, Environment, ManagerConfig, SettingsLocation,
};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

/// Load the Agent configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_agent_config() -> Result<AgentConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_agent_config_from_env()
}

/// Load the Agent configuration from variables already in the process environment.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_agent_config_from_env() -> Result<AgentConfig, ConfigError> {
    build_agent_config(|key| std::env::var(key))
}

/// Load the Agent configuration with the settings document pinned to a local
/// file. `BRANDSCAN_SETTINGS_URL` and `BRANDSCAN_SETTINGS_PATH` are ignored.
///
/// # Errors
///
/// Returns `ConfigError` if any other value is invalid.
pub fn load_agent_config_with_settings_path(path: &Path) -> Result<AgentConfig, ConfigError> {
    dotenvy::dotenv().ok();
    let mut config = build_agent_config(|key| match key {
        "BRANDSCAN_SETTINGS_URL" => Err(std::env::VarError::NotPresent),
        "BRANDSCAN_SETTINGS_PATH" => Ok(path.display().to_string()),
        other => std::env::var(other),
    })?;
    config.settings = SettingsLocation::Path(path.to_path_buf());
    Ok(config)
}

/// Load the Manager configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_manager_config() -> Result<ManagerConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_manager_config_from_env()
}

/// Load the Manager configuration from variables already in the process environment.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_manager_config_from_env() -> Result<ManagerConfig, ConfigError> {
    build_manager_config(|key| std::env::var(key))
}

/// Typed accessors over an env-var lookup function.
///
/// Keeps parsing decoupled from the real process environment so tests can use
/// a plain `HashMap` instead of `set_var`/`remove_var`.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    fn require(&self, var: &str) -> Result<String, ConfigError> {
        (self.lookup)(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    }

    fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or_default(&self, var: &str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.or_default(var, default);
        raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    }

    fn environment(&self) -> Result<Environment, ConfigError> {
        parse_environment(&self.or_default("BRANDSCAN_ENV", "development"))
    }
}

fn build_agent_config<F>(lookup: F) -> Result<AgentConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let vars = Vars { lookup };

    let env = vars.environment()?;
    let bind_addr: SocketAddr = vars.parse("BRANDSCAN_AGENT_BIND_ADDR", "0.0.0.0:8080")?;
    let log_level = vars.or_default("BRANDSCAN_LOG_LEVEL", "info");

    let settings = match (
        vars.optional("BRANDSCAN_SETTINGS_URL"),
        vars.optional("BRANDSCAN_SETTINGS_PATH"),
    ) {
        (Some(url), _) => SettingsLocation::Url(url),
        (None, Some(path)) => SettingsLocation::Path(PathBuf::from(path)),
        (None, None) => {
            return Err(ConfigError::MissingEnvVar(
                "BRANDSCAN_SETTINGS_URL or BRANDSCAN_SETTINGS_PATH".to_string(),
            ))
        }
    };

    let work_dir = PathBuf::from(vars.or_default("BRANDSCAN_WORK_DIR", "./work"));
    let fetch_timeout_secs = vars.parse("BRANDSCAN_FETCH_TIMEOUT_SECS", "30")?;
    let user_agent = vars.or_default("BRANDSCAN_USER_AGENT", DEFAULT_USER_AGENT);
    let fetch_max_attempts: u32 = vars.parse("BRANDSCAN_FETCH_MAX_ATTEMPTS", "5")?;
    if fetch_max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "BRANDSCAN_FETCH_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let fetch_backoff_factor_ms = vars.parse("BRANDSCAN_FETCH_BACKOFF_FACTOR_MS", "500")?;
    let inter_request_delay_ms = vars.parse("BRANDSCAN_INTER_REQUEST_DELAY_MS", "0")?;
    let render_service_url = vars.optional("BRANDSCAN_RENDER_SERVICE_URL");
    let credential_attempts = vars.parse("BRANDSCAN_CREDENTIAL_ATTEMPTS", "2")?;

    let blob = match vars.optional("BRANDSCAN_BLOB_ENDPOINT") {
        Some(endpoint) => {
            let endpoint = endpoint.trim_end_matches('/').to_string();
            let public_base = vars
                .optional("BRANDSCAN_BLOB_PUBLIC_BASE")
                .map_or_else(|| endpoint.clone(), |b| b.trim_end_matches('/').to_string());
            BlobTarget::Http {
                endpoint,
                public_base,
                token: vars.optional("BRANDSCAN_BLOB_TOKEN"),
            }
        }
        None => BlobTarget::Directory(PathBuf::from(
            vars.or_default("BRANDSCAN_BLOB_DIR", "./published"),
        )),
    };

    let count_convention =
        parse_count_convention(&vars.or_default("BRANDSCAN_COUNT_CONVENTION", "legacy"))?;

    Ok(AgentConfig {
        env,
        bind_addr,
        log_level,
        settings,
        work_dir,
        fetch_timeout_secs,
        user_agent,
        fetch_max_attempts,
        fetch_backoff_factor_ms,
        inter_request_delay_ms,
        render_service_url,
        credential_attempts,
        blob,
        count_convention,
    })
}

fn build_manager_config<F>(lookup: F) -> Result<ManagerConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let vars = Vars { lookup };

    let database_url = vars.require("DATABASE_URL")?;
    let env = vars.environment()?;
    let bind_addr: SocketAddr = vars.parse("BRANDSCAN_MANAGER_BIND_ADDR", "0.0.0.0:8081")?;
    let log_level = vars.or_default("BRANDSCAN_LOG_LEVEL", "info");

    let db_max_connections = vars.parse("BRANDSCAN_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = vars.parse("BRANDSCAN_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = vars.parse("BRANDSCAN_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let dispatch_endpoint_id = vars.parse("BRANDSCAN_DISPATCH_ENDPOINT_ID", "9")?;
    let callback_endpoint_id = vars.parse("BRANDSCAN_CALLBACK_ENDPOINT_ID", "8")?;
    let dispatch_timeout_secs = vars.parse("BRANDSCAN_DISPATCH_TIMEOUT_SECS", "30")?;

    Ok(ManagerConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        dispatch_endpoint_id,
        callback_endpoint_id,
        dispatch_timeout_secs,
        sendgrid_api_key: vars.optional("SENDGRID_API_KEY"),
        alert_to: vars.optional("BRANDSCAN_ALERT_TO"),
        alert_cc: vars.optional("BRANDSCAN_ALERT_CC"),
        alert_from: vars.or_default("BRANDSCAN_ALERT_FROM", "alerts@brandscan.local"),
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BRANDSCAN_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_count_convention(s: &str) -> Result<CountConvention, ConfigError> {
    match s {
        "legacy" => Ok(CountConvention::Legacy),
        "exact" => Ok(CountConvention::Exact),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BRANDSCAN_COUNT_CONVENTION".to_string(),
            reason: format!("expected 'legacy' or 'exact', got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
