//! Scheduler process: watches nodes and pods on the apiserver and binds
//! pending pods, preferring nodes that keep replicas spread across
//! topology domains.

use scheduler::{config::load_config, controller::Scheduler};
use tracing_subscriber::{self, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_config()?;
    tracing::info!(
        apiserver = %config.apiserver,
        weighting = %config.spread_weighting,
        "Starting scheduler"
    );

    Scheduler::run(config).await.map_err(|e| e.to_string())
}
