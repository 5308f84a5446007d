use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub session: SessionConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Health server port (default: 8080)
    #[serde(default)]
    pub health_port: Option<u16>,
}

/// Connection lifecycle settings for one monitoring session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Base address of the backend; the WebSocket endpoint is derived from
    /// it (e.g. "https://api.example.com" becomes
    /// "wss://api.example.com/ws/session/<id>")
    pub base_url: String,
    /// Session identifier; generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
    /// Connection-open timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Heartbeat cadence while connected, in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// First reconnect delay in milliseconds; doubles per attempt
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    /// Upper bound on the reconnect delay in milliseconds
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
    /// Reconnect attempts before the session gives up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Outbound queue capacity while offline
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_cap_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_queue_capacity() -> usize {
    100
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            session_id: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_cap_ms: default_reconnect_cap_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Signal collection settings
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Per-source time budget in milliseconds
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    /// Also run the best-effort auxiliary collectors (performance, system,
    /// display) in composite passes
    #[serde(default = "default_true")]
    pub auxiliary: bool,
    /// Iterations for the performance micro-benchmarks
    #[serde(default = "default_benchmark_iterations")]
    pub benchmark_iterations: u32,
    /// Let the network probe look up the public address over HTTP
    #[serde(default)]
    pub public_address_probe: bool,
}

fn default_source_timeout_ms() -> u64 {
    3_000
}

fn default_true() -> bool {
    true
}

fn default_benchmark_iterations() -> u32 {
    20_000
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            source_timeout_ms: default_source_timeout_ms(),
            auxiliary: true,
            benchmark_iterations: default_benchmark_iterations(),
            public_address_probe: false,
        }
    }
}

/// Periodic streaming settings
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    /// Cadence of snapshot collection and transmission, in milliseconds
    #[serde(default = "default_stream_interval_ms")]
    pub interval_ms: u64,
    /// Server-push subscriptions requested at startup
    #[serde(default = "default_subscriptions")]
    pub subscriptions: Vec<String>,
}

fn default_stream_interval_ms() -> u64 {
    15_000
}

fn default_subscriptions() -> Vec<String> {
    vec![
        "fingerprint_updates".to_string(),
        "violation_alerts".to_string(),
        "device_analytics".to_string(),
        "session_integrity".to_string(),
    ]
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_stream_interval_ms(),
            subscriptions: default_subscriptions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for rolling log files; stderr-only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("session.connect_timeout_ms", 10_000)?
            .set_default("session.heartbeat_interval_ms", 30_000)?
            .set_default("session.reconnect_base_ms", 1_000)?
            .set_default("session.reconnect_cap_ms", 30_000)?
            .set_default("session.max_reconnect_attempts", 10)?
            .set_default("session.queue_capacity", 100)?
            .set_default("collector.source_timeout_ms", 3_000)?
            .set_default("streaming.interval_ms", 15_000)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("ARGUS_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (ARGUS_SESSION__BASE_URL, etc.)
            .add_source(
                Environment::with_prefix("ARGUS")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a configuration for CLI usage without a config file
    pub fn default_config(base_url: &str, session_id: Option<String>) -> Self {
        Self {
            session: SessionConfig {
                base_url: base_url.to_string(),
                session_id,
                ..SessionConfig::default()
            },
            collector: CollectorConfig::default(),
            streaming: StreamingConfig::default(),
            logging: LoggingConfig::default(),
            health_port: Some(8080),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match Url::parse(&self.session.base_url) {
            Ok(url) => {
                if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
                    errors.push(format!(
                        "base_url scheme must be http(s) or ws(s), got {}",
                        url.scheme()
                    ));
                }
            }
            Err(e) => errors.push(format!("base_url is not a valid URL: {}", e)),
        }

        if self.session.connect_timeout_ms == 0 {
            errors.push("connect_timeout_ms must be positive".to_string());
        }
        if self.session.heartbeat_interval_ms == 0 {
            errors.push("heartbeat_interval_ms must be positive".to_string());
        }
        if self.session.reconnect_base_ms == 0 {
            errors.push("reconnect_base_ms must be positive".to_string());
        }
        if self.session.reconnect_cap_ms < self.session.reconnect_base_ms {
            errors.push("reconnect_cap_ms must be >= reconnect_base_ms".to_string());
        }
        if self.session.max_reconnect_attempts == 0 {
            errors.push("max_reconnect_attempts must be at least 1".to_string());
        }
        if self.session.queue_capacity == 0 {
            errors.push("queue_capacity must be at least 1".to_string());
        }

        if self.collector.source_timeout_ms == 0 {
            errors.push("source_timeout_ms must be positive".to_string());
        }
        if self.collector.benchmark_iterations == 0 {
            errors.push("benchmark_iterations must be positive".to_string());
        }

        if self.streaming.interval_ms < 100 {
            errors.push("streaming interval_ms must be at least 100".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
