use amonitor_cli::PanelCli;
use amonitor_panel::PanelConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = PanelCli::parse();
    let config = PanelConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str())),
        )
        .init();

    amonitor_cli::run(cli, config).await
}
