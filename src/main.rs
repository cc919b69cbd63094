use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;

mod cli;

use cephrgw_exporter::{
    config::load_config, exposition, init_tracing, registry::MetricRegistry, server,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let config = load_config(args.config.as_deref(), args.overrides())?;
    init_tracing(&config.server.log_level, &config.server.log_format);

    if args.once {
        return run_once(&config).await;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cephrgw-exporter starting...");
    server::start_server(config).await
}

/// Single pass for checking credentials and connectivity.
///
/// The exposition goes to stdout, the summary to stderr.
async fn run_once(config: &cephrgw_exporter::config::Config) -> Result<()> {
    let registry = Arc::new(MetricRegistry::new());
    let scheduler = server::create_scheduler(config, Arc::clone(&registry))?;

    match scheduler.run_once().await {
        Ok(snapshot) => {
            print!("{}", exposition::render(&snapshot));
            eprintln!(
                "{} {} buckets, {} users from {}",
                "OK".green().bold(),
                snapshot.buckets.len(),
                snapshot.users.len(),
                config.endpoint.cyan()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "FAILED".red().bold(), e);
            Err(e.into())
        }
    }
}
