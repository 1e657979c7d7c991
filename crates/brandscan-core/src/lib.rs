pub mod app_config;
pub mod brands;
pub mod config;
pub mod jobs;

pub use app_config::{
    AgentConfig, BlobTarget, CountConvention, Environment, ManagerConfig, SettingsLocation,
};
pub use brands::{
    load_settings_file, parse_settings_document, resolve_brand, BrandConfig, Category,
    LocaleDescriptor,
};
pub use config::{
    load_agent_config, load_agent_config_from_env, load_agent_config_with_settings_path,
    load_manager_config, load_manager_config_from_env,
};
pub use jobs::{JobDispatch, JobResult, JobState, ScanJob};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read settings file {path}: {source}")]
    SettingsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch settings from {url}: {reason}")]
    SettingsFetch { url: String, reason: String },

    #[error("failed to parse settings from {context}: {reason}")]
    SettingsParse { context: String, reason: String },

    #[error("no settings found for brand_id {0}")]
    UnknownBrand(String),

    #[error("no brand strategy registered for brand_id {0}")]
    UnregisteredBrand(String),

    #[error("settings validation failed: {0}")]
    Validation(String),
}
