use metrics_exporter_prometheus::PrometheusBuilder;
use mock_ledger::MockConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_ADDR: &str = "0.0.0.0:7051";
const METRICS_ADDR: &str = "0.0.0.0:8051";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mock_ledger=info")),
        )
        .init();

    let metrics_addr: SocketAddr = METRICS_ADDR.parse()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;

    let addr: SocketAddr = std::env::var("MOCK_LEDGER_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    let config = MockConfig::new().phase_delay(Duration::from_millis(10));

    mock_ledger::run(addr, config).await?;
    Ok(())
}
