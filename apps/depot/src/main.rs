//! `depot` binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use depot::cli::{self, Cli};

const DEFAULT_LOG_FILTER: &str = "depot=info,depot_db=info,depot_notify=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    cli::run(cli).await
}
