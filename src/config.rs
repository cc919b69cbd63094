use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment prefix for configuration overrides, e.g.
/// `CEPHRGW_EXPORTER_REFRESH__INTERVAL_SECONDS=30`.
pub const ENV_PREFIX: &str = "CEPHRGW_EXPORTER";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Admin API endpoint, e.g. `http://rgw.example:7480`
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub signing: SigningConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// `host:port`; a bare `:port` listens on all interfaces
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let address = if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        };
        address
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address '{}': {}", self.listen_address, e))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Pause between the end of one pass and the start of the next (default: 60)
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Per admin request timeout (default: 30)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum in-flight per-entity fetches within a pass (default: 8)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound of the random delay added to each pause (default: 0)
    #[serde(default)]
    pub jitter_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            timeout_seconds: default_timeout_seconds(),
            concurrency: default_concurrency(),
            jitter_seconds: 0,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_seconds)
    }
}

/// SigV4 scope. RGW accepts any region unless zonegroups are configured.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SigningConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_service")]
    pub service: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            service: default_service(),
        }
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:19128".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_concurrency() -> usize {
    8
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_service() -> String {
    "s3".to_string()
}

/// Values given on the command line; they take precedence over file and env.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub listen_address: Option<String>,
    pub interval_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub concurrency: Option<usize>,
}

/// Load configuration: defaults, then the optional TOML file, then
/// `CEPHRGW_EXPORTER_*` environment variables, then `overrides`.
pub fn load_config(file: Option<&Path>, overrides: Overrides) -> anyhow::Result<Config> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let mut cfg: Config = builder.build()?.try_deserialize()?;
    apply_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;

    Ok(cfg)
}

fn apply_overrides(cfg: &mut Config, overrides: Overrides) {
    if let Some(endpoint) = overrides.endpoint {
        cfg.endpoint = endpoint;
    }
    if let Some(listen_address) = overrides.listen_address {
        cfg.server.listen_address = listen_address;
    }
    if let Some(interval) = overrides.interval_seconds {
        cfg.refresh.interval_seconds = interval;
    }
    if let Some(timeout) = overrides.timeout_seconds {
        cfg.refresh.timeout_seconds = timeout;
    }
    if let Some(concurrency) = overrides.concurrency {
        cfg.refresh.concurrency = concurrency;
    }
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.endpoint.trim().is_empty() {
        anyhow::bail!("No admin endpoint configured; pass it as the first argument");
    }

    let endpoint = url::Url::parse(cfg.endpoint.trim_end_matches('/'))
        .map_err(|e| anyhow::anyhow!("Invalid admin endpoint '{}': {}", cfg.endpoint, e))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        anyhow::bail!("Admin endpoint must use http or https, got '{}'", endpoint.scheme());
    }

    cfg.server.socket_addr()?;

    if !matches!(cfg.server.log_format.as_str(), "text" | "json") {
        anyhow::bail!("log_format must be 'text' or 'json', got '{}'", cfg.server.log_format);
    }
    if cfg.refresh.interval_seconds == 0 {
        anyhow::bail!("refresh.interval_seconds must be > 0");
    }
    if cfg.refresh.timeout_seconds == 0 {
        anyhow::bail!("refresh.timeout_seconds must be > 0");
    }
    if cfg.refresh.concurrency == 0 {
        anyhow::bail!("refresh.concurrency must be > 0");
    }
    if cfg.signing.region.is_empty() || cfg.signing.service.is_empty() {
        anyhow::bail!("signing.region and signing.service cannot be empty");
    }

    Ok(())
}
