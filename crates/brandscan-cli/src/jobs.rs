//! Job and brand command handlers for the CLI.
//!
//! `run` executes one job inline with the same runtime the Agent uses, so a
//! brand can be scanned without a Manager or an HTTP hop.

use std::path::Path;

use brandscan_core::{AgentConfig, BrandConfig, JobDispatch};
use brandscan_scraper::settings::settings_source;
use brandscan_scraper::{JobRuntime, SettingsSource, StrategyRegistry};

/// Agent configuration from the environment; `settings_path` pins the
/// settings document to a local file.
pub(crate) fn agent_config(settings_path: Option<&Path>) -> anyhow::Result<AgentConfig> {
    let config = match settings_path {
        Some(path) => brandscan_core::load_agent_config_with_settings_path(path)?,
        None => brandscan_core::load_agent_config()?,
    };
    Ok(config)
}

/// Runs one job to completion and prints its [`brandscan_core::JobResult`]
/// as JSON.
///
/// Without `callback` the completion notification is skipped.
///
/// # Errors
///
/// Returns an error if the runtime cannot be built or the job fails at job
/// level (unregistered brand, unusable settings, publishing failure).
pub(crate) async fn run_job(config: AgentConfig, dispatch: JobDispatch) -> anyhow::Result<()> {
    let runtime = JobRuntime::from_config(config)?;
    let result = runtime.run(&dispatch).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// One `brand_id<TAB>name` line per registered strategy, in registration order.
pub(crate) fn brand_lines(registry: &StrategyRegistry) -> Vec<String> {
    registry
        .entries()
        .map(|entry| format!("{}\t{}", entry.brand_id, entry.name))
        .collect()
}

pub(crate) fn list_brands() {
    for line in brand_lines(&StrategyRegistry::builtin()) {
        println!("{line}");
    }
}

/// Resolves `brand_id` against the configured settings source.
///
/// # Errors
///
/// Returns an error if the settings cannot be loaded or hold no entry for the
/// brand.
pub(crate) async fn resolve_settings(
    config: &AgentConfig,
    brand_id: &str,
) -> anyhow::Result<BrandConfig> {
    let source = settings_source(&config.settings, config.fetch_timeout_secs)?;
    Ok(source.load(brand_id).await?)
}

pub(crate) async fn show_settings(config: &AgentConfig, brand_id: &str) -> anyhow::Result<()> {
    let brand = resolve_settings(config, brand_id).await?;
    println!("{}", serde_json::to_string_pretty(&brand)?);
    Ok(())
}

/// Applies pending Manager migrations.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is missing, the database is
/// unreachable, or a migration fails.
pub(crate) async fn migrate() -> anyhow::Result<()> {
    let config = brandscan_core::load_manager_config()?;
    let pool = brandscan_db::connect_pool(
        &config.database_url,
        brandscan_db::PoolConfig::from_manager_config(&config),
    )
    .await?;
    let applied = brandscan_db::run_migrations(&pool).await?;
    println!("applied {applied} migration(s)");
    Ok(())
}
