use async_trait::async_trait;
use serde_json::{json, Value};

use super::DataSource;
use crate::domain::device;
use crate::error::Result;

/// CPU, architecture, and memory signals
pub struct HardwareSource;

impl HardwareSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HardwareSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for HardwareSource {
    fn category(&self) -> &str {
        "hardware"
    }

    async fn collect(&self) -> Result<Value> {
        let mut payload = json!({
            "cpu_count": device::cpu_count(),
            "architecture": std::env::consts::ARCH,
            "family": std::env::consts::FAMILY,
        });

        if let Some((total_kb, available_kb)) = read_memory_kb() {
            payload["memory_total_kb"] = json!(total_kb);
            payload["memory_available_kb"] = json!(available_kb);
        }

        Ok(payload)
    }
}

/// MemTotal/MemAvailable from /proc/meminfo, None when unreadable
fn read_memory_kb() -> Option<(u64, u64)> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    let mut total = None;
    let mut available = None;

    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = parse_meminfo_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = parse_meminfo_kb(rest);
        }
    }

    Some((total?, available?))
}

fn parse_meminfo_kb(rest: &str) -> Option<u64> {
    rest.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_hardware_payload_shape() {
        let source = HardwareSource::new();
        assert_eq!(source.category(), "hardware");

        let payload = assert_ok!(source.collect().await);
        assert!(payload["cpu_count"].as_u64().unwrap() >= 1);
        assert!(!payload["architecture"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_parse_meminfo_line() {
        assert_eq!(parse_meminfo_kb("       16309564 kB"), Some(16_309_564));
        assert_eq!(parse_meminfo_kb(" garbage kB"), None);
        assert_eq!(parse_meminfo_kb(""), None);
    }
}
