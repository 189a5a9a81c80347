use anyhow::Result;
use imangor::config;
use imangor::infrastructure::observability::init_metrics_handle;
use imangor::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_from_env()?;
    init_tracing(&config.log_level, &config.log_format);
    config.print_summary();

    let metrics = init_metrics_handle();
    if metrics.is_none() {
        tracing::warn!("Metrics recorder could not be installed, /metrics disabled");
    }

    server::run(config, metrics).await
}

fn init_tracing(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if log_format == "json" {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}
