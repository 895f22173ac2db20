use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

const DEFAULT_LOG_FILTER: &str = "ledgerbench=info,ledger_client=info,mock_ledger=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = commands::Cli::parse();

    if let Some(addr) = cli.prometheus {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
    }

    cli.run().await
}
