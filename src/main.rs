use anyhow::Result;
use clap::Parser;
use ecomm_reporter::{
    app,
    config::{Cli, Command, FrontendConfig, ReporterConfig},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Frontend(args) => {
            let cfg = FrontendConfig::from_args(args)?;
            tracing::info!("Starting frontend with config: {:?}", cfg);

            let state = app::frontend_state(&cfg).await?;
            let router = app::frontend_app(state, cfg.spa_build_root.as_deref());
            app::serve(&cfg.addr(), cfg.port, router).await
        }
        Command::Backend(args) => {
            let cfg = ReporterConfig::from_args(args)?;
            tracing::info!("Starting reporter with config: {:?}", cfg);

            let store = app::reporter_store(&cfg).await?;
            tracing::info!(
                "Serving bucket {} from {}",
                store.bucket().name,
                store.base_path.display()
            );
            app::serve(&cfg.addr(), cfg.port, app::reporter_app(store)).await
        }
        Command::Version => {
            println!("ecomm-reporter cli v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
