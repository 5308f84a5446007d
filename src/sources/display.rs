use async_trait::async_trait;
use serde_json::{json, Value};

use super::DataSource;
use crate::error::{Result, SourceError};

/// Terminal geometry probe.
///
/// Headless processes have no terminal to measure; that case surfaces as
/// a failed category rather than a fabricated size.
pub struct DisplaySource;

impl DisplaySource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DisplaySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for DisplaySource {
    fn category(&self) -> &str {
        "display"
    }

    async fn collect(&self) -> Result<Value> {
        if let Ok((columns, rows)) = crossterm::terminal::size() {
            return Ok(json!({
                "columns": columns,
                "rows": rows,
                "measured": true,
            }));
        }

        // Shells export geometry even when no tty is attached
        if let (Some(columns), Some(rows)) = (env_dimension("COLUMNS"), env_dimension("LINES")) {
            return Ok(json!({
                "columns": columns,
                "rows": rows,
                "measured": false,
            }));
        }

        Err(SourceError::Unavailable {
            signal: "terminal geometry".to_string(),
        }
        .into())
    }
}

fn env_dimension(key: &str) -> Option<u16> {
    std::env::var(key).ok()?.trim().parse().ok()
}
