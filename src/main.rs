// Entry point. No CLI flags: behavior is driven entirely by the config file
// (path overridable via NATS_BENCH_CONFIG).
use anyhow::{Context, Result};
use nats_jetstream_bench::config::Config;
use nats_jetstream_bench::runner;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().context("load configuration")?;
    runner::run_testers(&config).await
}
