use async_trait::async_trait;
use serde_json::{json, Value};

use super::DataSource;
use crate::error::Result;

/// OS summary: platform, kernel release, distribution name
pub struct SystemSource;

impl SystemSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for SystemSource {
    fn category(&self) -> &str {
        "system"
    }

    async fn collect(&self) -> Result<Value> {
        let mut payload = json!({
            "os": std::env::consts::OS,
        });

        if let Some(kernel) = kernel_release() {
            payload["kernel"] = json!(kernel);
        }
        if let Some(distro) = distribution_name() {
            payload["distribution"] = json!(distro);
        }

        Ok(payload)
    }
}

fn kernel_release() -> Option<String> {
    let release = std::fs::read_to_string("/proc/sys/kernel/osrelease").ok()?;
    let release = release.trim();
    if release.is_empty() {
        None
    } else {
        Some(release.to_string())
    }
}

/// PRETTY_NAME from /etc/os-release, unquoted
fn distribution_name() -> Option<String> {
    let contents = std::fs::read_to_string("/etc/os-release").ok()?;
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("PRETTY_NAME=") {
            let name = value.trim().trim_matches('"');
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_payload_shape() {
        let source = SystemSource::new();
        assert_eq!(source.category(), "system");

        let payload = source.collect().await.unwrap();
        assert_eq!(payload["os"].as_str().unwrap(), std::env::consts::OS);
    }
}
