//! Service configuration.

use outflow_core::{DispatchConfig, PricingConfig};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/outflow").
    pub data_dir: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Seconds between background dispatcher ticks.
    pub dispatch_interval_seconds: u64,

    /// Credit pricing.
    pub pricing: PricingConfig,

    /// Dispatch limits and timing.
    pub dispatch: DispatchConfig,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut dispatch = DispatchConfig::default();
        if let Some(cap) = env_parse("DAILY_SEND_CAP") {
            dispatch.daily_send_cap = cap;
        }
        if let Some(batch) = env_parse("DISPATCH_BATCH_SIZE") {
            dispatch.batch_size = batch;
        }

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/outflow".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
            dispatch_interval_seconds: env_parse("DISPATCH_INTERVAL_SECONDS").unwrap_or(60),
            pricing: PricingConfig::default(),
            dispatch,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
