//! Fingerprint data sources
//!
//! Each source is an isolated probe that produces one category of the
//! device signature. Sources share no state and never see each other;
//! the aggregator runs them concurrently and records failures as
//! per-category error markers.

mod display;
mod environment;
mod hardware;
mod network;
mod performance;
mod runtime;
mod system;

pub use display::DisplaySource;
pub use environment::EnvironmentSource;
pub use hardware::HardwareSource;
pub use network::NetworkSource;
pub use performance::PerformanceSource;
pub use runtime::RuntimeSource;
pub use system::SystemSource;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::CollectorConfig;
use crate::error::Result;

/// One capability probe contributing a single category to a snapshot.
///
/// Implementations must be self-contained: a source that errors, stalls,
/// or panics is marked failed for the cycle without affecting its
/// siblings, so there is no need for internal retry or fallback logic.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Category name this source's payload is filed under
    fn category(&self) -> &str;

    /// Produce this source's payload
    async fn collect(&self) -> Result<Value>;
}

/// Core probes run on every collection pass
pub fn core_sources(config: &CollectorConfig) -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(HardwareSource::new()),
        Arc::new(RuntimeSource::new()),
        Arc::new(NetworkSource::new(config.public_address_probe)),
        Arc::new(EnvironmentSource::new()),
    ]
}

/// Best-effort auxiliary probes added by a full collection pass
pub fn auxiliary_sources(config: &CollectorConfig) -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(PerformanceSource::new(config.benchmark_iterations)),
        Arc::new(SystemSource::new()),
        Arc::new(DisplaySource::new()),
    ]
}
