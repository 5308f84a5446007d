use async_trait::async_trait;
use serde_json::{json, Value};

use super::DataSource;
use crate::domain::device;
use crate::error::Result;

/// Session environment signals: user, shell, terminal, locale, timezone
pub struct EnvironmentSource;

impl EnvironmentSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvironmentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for EnvironmentSource {
    fn category(&self) -> &str {
        "environment"
    }

    async fn collect(&self) -> Result<Value> {
        Ok(json!({
            "user": device::username(),
            "shell": env_or_unknown("SHELL"),
            "term": env_or_unknown("TERM"),
            "locale": locale(),
            "timezone": timezone(),
        }))
    }
}

fn env_or_unknown(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| "unknown".to_string())
}

fn locale() -> String {
    std::env::var("LC_ALL")
        .or_else(|_| std::env::var("LANG"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// TZ if set, then /etc/timezone on platforms that carry it
fn timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if !tz.trim().is_empty() {
            return tz.trim().to_string();
        }
    }
    if let Ok(contents) = std::fs::read_to_string("/etc/timezone") {
        let tz = contents.trim();
        if !tz.is_empty() {
            return tz.to_string();
        }
    }
    "unknown".to_string()
}
