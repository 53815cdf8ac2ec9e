use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use scada_export_service::{
    config::AppConfig,
    observability, pipeline,
    sinks::GitLabUploadSink,
    sources::{GitLabFileSource, IsrApiClient},
};

/// Fetch the requested SCADA points from the ISR API, using a point file
/// kept in GitLab, and publish the merged snapshot back.
#[derive(Parser)]
#[command(name = "scada-export", version)]
struct Args {
    /// Configuration file, defaults to settings.toml from the program directory
    #[arg(long)]
    conf: Option<PathBuf>,
}

fn default_config_path() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(dir.join("settings.toml"))
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args = Args::parse();
    let config_path = match args.conf {
        Some(path) => path,
        None => default_config_path()?,
    };
    let cfg = AppConfig::load(&config_path)?;

    let source = GitLabFileSource::new(&cfg.gitlab, cfg.ssl_verify)?;
    let api = IsrApiClient::new(&cfg.data_api, cfg.ssl_verify)?;
    let publisher = GitLabUploadSink::new(&cfg.gitlab, cfg.ssl_verify)?;

    pipeline::run(&cfg, &source, &api, &publisher).await?;

    tracing::info!("done");
    Ok(())
}
