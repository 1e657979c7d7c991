mod jobs;

use std::path::PathBuf;

use brandscan_core::JobDispatch;
use brandscan_scraper::JobLogLayer;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "brandscan-cli")]
#[command(about = "Brand catalog scan command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one scan job inline and print its result as JSON
    Run {
        #[arg(long)]
        job_id: String,
        #[arg(long)]
        brand_id: String,
        /// Manager base URL to notify on completion; omitted means no notification
        #[arg(long)]
        callback: Option<String>,
        #[arg(long)]
        scan_url: Option<String>,
        /// Local settings document to use instead of the configured source
        #[arg(long, env = "BRANDSCAN_CLI_SETTINGS_PATH")]
        settings_path: Option<PathBuf>,
    },
    /// List registered brand strategies
    Brands,
    /// Print the resolved settings for one brand
    Settings {
        #[arg(long)]
        brand_id: String,
        #[arg(long, env = "BRANDSCAN_CLI_SETTINGS_PATH")]
        settings_path: Option<PathBuf>,
    },
    /// Apply pending Manager database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(JobLogLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run {
            job_id,
            brand_id,
            callback,
            scan_url,
            settings_path,
        }) => {
            let config = jobs::agent_config(settings_path.as_deref())?;
            let dispatch = JobDispatch {
                job_id,
                brand_id,
                scan_url,
                callback_endpoint: callback,
            };
            jobs::run_job(config, dispatch).await?;
        }
        Some(Commands::Brands) => jobs::list_brands(),
        Some(Commands::Settings {
            brand_id,
            settings_path,
        }) => {
            let config = jobs::agent_config(settings_path.as_deref())?;
            jobs::show_settings(&config, &brand_id).await?;
        }
        Some(Commands::Migrate) => jobs::migrate().await?,
        None => {
            println!("brandscan-cli: no command given; try --help");
        }
    }

    Ok(())
}
