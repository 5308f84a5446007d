use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;

use super::DataSource;
use crate::error::Result;

/// Process-level signals: pid, executable path, build target, uptime.
///
/// Uptime is measured from source construction, which happens once at
/// collector startup.
pub struct RuntimeSource {
    started: Instant,
}

impl RuntimeSource {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for RuntimeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for RuntimeSource {
    fn category(&self) -> &str {
        "runtime"
    }

    async fn collect(&self) -> Result<Value> {
        let executable = std::env::current_exe()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(json!({
            "pid": std::process::id(),
            "executable": executable,
            "build_target": {
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "family": std::env::consts::FAMILY,
            },
            "uptime_ms": self.started.elapsed().as_millis() as u64,
        }))
    }
}
