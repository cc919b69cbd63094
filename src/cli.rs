use clap::Parser;
use std::path::PathBuf;

use cephrgw_exporter::config::Overrides;

#[derive(Parser, Debug)]
#[command(
    name = "cephrgw-exporter",
    version,
    about = "Prometheus exporter for Ceph RGW bucket, user and quota usage"
)]
pub struct Cli {
    /// RGW admin API endpoint, e.g. http://rgw.example:7480
    pub endpoint: Option<String>,

    /// Configuration file path (TOML)
    #[arg(short, long, env = "CEPHRGW_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to serve /metrics on, `host:port` or `:port`
    #[arg(short, long)]
    pub listen_address: Option<String>,

    /// Seconds to wait between refresh passes
    #[arg(long)]
    pub interval_seconds: Option<u64>,

    /// Per admin request timeout in seconds
    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// Maximum in-flight admin requests during a pass
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Run a single refresh pass, print the exposition and exit
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            endpoint: self.endpoint.clone(),
            listen_address: self.listen_address.clone(),
            interval_seconds: self.interval_seconds,
            timeout_seconds: self.timeout_seconds,
            concurrency: self.concurrency,
        }
    }
}
