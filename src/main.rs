use anyhow::Result;
use par_object_manager::{config::AppConfig, handlers::command_handlers};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // --- Logging setup (stderr, so listings on stdout stay clean) ---
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("par_object_manager=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;
    tracing::debug!(settings = %cfg.settings_path.display(), "starting");

    command_handlers::run(cfg, command).await
}
