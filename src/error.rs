use thiserror::Error;

/// Main error type for the monitoring client
#[derive(Error, Debug)]
pub enum ArgusError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection attempt timed out after {elapsed_ms}ms")]
    ConnectTimeout { elapsed_ms: u64 },

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Session lifecycle errors
    #[error("Reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    // Data collection errors
    #[error("Source failure: {category} - {reason}")]
    Source { category: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ArgusError
pub type Result<T> = std::result::Result<T, ArgusError>;

/// Specific error types for signal collection
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("Signal unavailable: {signal}")]
    Unavailable { signal: String },

    #[error("Probe failed: {reason}")]
    Probe { reason: String },

    #[error("Timeout after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

impl From<SourceError> for ArgusError {
    fn from(err: SourceError) -> Self {
        ArgusError::Source {
            category: "probe".to_string(),
            reason: err.to_string(),
        }
    }
}
