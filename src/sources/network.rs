use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::DataSource;
use crate::domain::device;
use crate::error::Result;

const PUBLIC_ADDRESS_URL: &str = "https://api.ipify.org";

/// Host naming and addressing signals.
///
/// The public address lookup goes out to the network and is disabled by
/// default; when it fails the field is simply omitted.
pub struct NetworkSource {
    probe_public_address: bool,
    http: reqwest::Client,
}

impl NetworkSource {
    pub fn new(probe_public_address: bool) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .expect("failed to build reqwest client");

        Self {
            probe_public_address,
            http,
        }
    }

    async fn public_address(&self) -> Option<String> {
        let response = match self.http.get(PUBLIC_ADDRESS_URL).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Public address lookup failed: {}", e);
                return None;
            }
        };

        match response.text().await {
            Ok(body) => {
                let addr = body.trim();
                if addr.is_empty() {
                    None
                } else {
                    Some(addr.to_string())
                }
            }
            Err(e) => {
                debug!("Public address response unreadable: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl DataSource for NetworkSource {
    fn category(&self) -> &str {
        "network"
    }

    async fn collect(&self) -> Result<Value> {
        let mut payload = json!({
            "hostname": device::hostname(),
        });

        if self.probe_public_address {
            if let Some(addr) = self.public_address().await {
                payload["public_address"] = json!(addr);
            }
        }

        Ok(payload)
    }
}
