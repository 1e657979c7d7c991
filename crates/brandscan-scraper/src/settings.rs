//! Brand settings sources. Settings are read fresh for every job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brandscan_core::{
    load_settings_file, parse_settings_document, resolve_brand, BrandConfig, ConfigError,
    SettingsLocation,
};
use reqwest::Client;

#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Resolves the settings entry for `brand_id`.
    async fn load(&self, brand_id: &str) -> Result<BrandConfig, ConfigError>;
}

/// Remote JSON settings document fetched with a plain `GET`.
#[derive(Debug, Clone)]
pub struct HttpSettingsSource {
    client: Client,
    url: String,
}

impl HttpSettingsSource {
    /// # Errors
    ///
    /// Returns [`ConfigError::SettingsFetch`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, ConfigError> {
        let url = url.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError::SettingsFetch {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl SettingsSource for HttpSettingsSource {
    async fn load(&self, brand_id: &str) -> Result<BrandConfig, ConfigError> {
        let fetch_err = |reason: String| ConfigError::SettingsFetch {
            url: self.url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }
        let body = response.text().await.map_err(|e| fetch_err(e.to_string()))?;

        let doc = parse_settings_document(&body, &self.url, false)?;
        resolve_brand(&doc, brand_id.trim())
    }
}

/// Local JSON or YAML settings document, re-read on every call.
#[derive(Debug, Clone)]
pub struct FileSettingsSource {
    path: PathBuf,
}

impl FileSettingsSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SettingsSource for FileSettingsSource {
    async fn load(&self, brand_id: &str) -> Result<BrandConfig, ConfigError> {
        let doc = load_settings_file(&self.path)?;
        resolve_brand(&doc, brand_id.trim())
    }
}

/// Builds the source named by the Agent configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] if an HTTP source cannot be constructed.
pub fn settings_source(
    location: &SettingsLocation,
    timeout_secs: u64,
) -> Result<Arc<dyn SettingsSource>, ConfigError> {
    Ok(match location {
        SettingsLocation::Url(url) => Arc::new(HttpSettingsSource::new(url.clone(), timeout_secs)?),
        SettingsLocation::Path(path) => Arc::new(FileSettingsSource::new(path.clone())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "229": {
            "Base_URL": "https://www.gucci.com/{locale}/c/productgrid?categoryCode={category}&page={page}",
            "Categories": ["bags"],
            "Locales": ["us/en"]
        }
    }"#;

    #[tokio::test]
    async fn file_source_resolves_brand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, DOC).unwrap();

        let config = FileSettingsSource::new(&path).load("229").await.unwrap();
        assert_eq!(config.brand_id, "229");
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.locales[0].get("locale"), Some("us/en"));
    }

    #[tokio::test]
    async fn file_source_is_reread_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, DOC).unwrap();
        let source = FileSettingsSource::new(&path);
        source.load("229").await.unwrap();

        std::fs::write(&path, "{}").unwrap();
        let err = source.load("229").await.unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBrand(id) if id == "229"));
    }

    #[tokio::test]
    async fn missing_file_is_a_configuration_error() {
        let source = FileSettingsSource::new("/nonexistent/brandscan/settings.json");
        assert!(matches!(
            source.load("229").await,
            Err(ConfigError::SettingsIo { .. })
        ));
    }
}
