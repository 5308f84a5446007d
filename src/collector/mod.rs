//! Parallel snapshot aggregation
//!
//! Runs every registered data source concurrently, fences each with a
//! per-source time budget, and merges the results into one snapshot.
//! A failed, slow, or panicking source costs its own category only.

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::CollectorConfig;
use crate::domain::Snapshot;
use crate::sources::{self, DataSource};

/// Settle-all aggregator over a fixed source registry
pub struct Aggregator {
    sources: Vec<Arc<dyn DataSource>>,
    auxiliary: Vec<Arc<dyn DataSource>>,
    source_timeout: Duration,
}

impl Aggregator {
    /// Aggregator over an explicit source set
    pub fn new(sources: Vec<Arc<dyn DataSource>>, source_timeout: Duration) -> Self {
        Self {
            sources,
            auxiliary: Vec::new(),
            source_timeout,
        }
    }

    /// Aggregator over the built-in probe set
    pub fn from_config(config: &CollectorConfig) -> Self {
        let auxiliary = if config.auxiliary {
            sources::auxiliary_sources(config)
        } else {
            Vec::new()
        };

        Self {
            sources: sources::core_sources(config),
            auxiliary,
            source_timeout: Duration::from_millis(config.source_timeout_ms),
        }
    }

    /// Replace the auxiliary set run by full passes
    pub fn with_auxiliary(mut self, auxiliary: Vec<Arc<dyn DataSource>>) -> Self {
        self.auxiliary = auxiliary;
        self
    }

    /// Number of core categories a pass will produce
    pub fn category_count(&self) -> usize {
        self.sources.len()
    }

    /// One collection pass over the core sources
    pub async fn collect(&self) -> Snapshot {
        self.run_pass(self.sources.clone()).await
    }

    /// One collection pass over core plus auxiliary sources
    pub async fn collect_full(&self) -> Snapshot {
        if self.auxiliary.is_empty() {
            return self.collect().await;
        }

        let combined: Vec<Arc<dyn DataSource>> = self
            .sources
            .iter()
            .chain(self.auxiliary.iter())
            .cloned()
            .collect();
        self.run_pass(combined).await
    }

    async fn run_pass(&self, sources: Vec<Arc<dyn DataSource>>) -> Snapshot {
        let captured_at = Utc::now();
        let started = Instant::now();
        let budget = self.source_timeout;

        let mut names = Vec::with_capacity(sources.len());
        let mut tasks = Vec::with_capacity(sources.len());
        for source in sources {
            names.push(source.category().to_string());
            tasks.push(tokio::spawn(async move {
                tokio::time::timeout(budget, source.collect()).await
            }));
        }

        let results = join_all(tasks).await;

        let mut categories = BTreeMap::new();
        for (name, result) in names.into_iter().zip(results) {
            let value = match result {
                Ok(Ok(Ok(value))) => value,
                Ok(Ok(Err(e))) => {
                    warn!("Source {} failed: {}", name, e);
                    Snapshot::error_marker(e.to_string())
                }
                Ok(Err(_)) => {
                    warn!(
                        "Source {} exceeded its {}ms budget",
                        name,
                        budget.as_millis()
                    );
                    Snapshot::error_marker(format!("timed out after {}ms", budget.as_millis()))
                }
                Err(e) => {
                    error!("Source {} task panicked: {}", name, e);
                    Snapshot::error_marker(format!("source panicked: {}", e))
                }
            };
            categories.insert(name, value);
        }

        let snapshot = Snapshot {
            collection_id: Uuid::new_v4().to_string(),
            collector_version: env!("CARGO_PKG_VERSION").to_string(),
            captured_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
            categories,
        };

        debug!(
            collection_id = %snapshot.collection_id,
            elapsed_ms = snapshot.elapsed_ms,
            categories = snapshot.categories.len(),
            failed = snapshot.failed_categories().len(),
            "Collection pass finished"
        );

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SourceError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::time::sleep;

    enum StubOutcome {
        Value(Value),
        Fail(&'static str),
        Hang(Duration),
        Panic,
    }

    struct StubSource {
        name: &'static str,
        outcome: StubOutcome,
    }

    impl StubSource {
        fn ok(name: &'static str, value: Value) -> Arc<dyn DataSource> {
            Arc::new(Self {
                name,
                outcome: StubOutcome::Value(value),
            })
        }

        fn failing(name: &'static str, reason: &'static str) -> Arc<dyn DataSource> {
            Arc::new(Self {
                name,
                outcome: StubOutcome::Fail(reason),
            })
        }

        fn hanging(name: &'static str, delay: Duration) -> Arc<dyn DataSource> {
            Arc::new(Self {
                name,
                outcome: StubOutcome::Hang(delay),
            })
        }

        fn panicking(name: &'static str) -> Arc<dyn DataSource> {
            Arc::new(Self {
                name,
                outcome: StubOutcome::Panic,
            })
        }
    }

    #[async_trait]
    impl DataSource for StubSource {
        fn category(&self) -> &str {
            self.name
        }

        async fn collect(&self) -> Result<Value> {
            match &self.outcome {
                StubOutcome::Value(v) => Ok(v.clone()),
                StubOutcome::Fail(reason) => Err(SourceError::Probe {
                    reason: reason.to_string(),
                }
                .into()),
                StubOutcome::Hang(delay) => {
                    sleep(*delay).await;
                    Ok(json!({}))
                }
                StubOutcome::Panic => panic!("stub blew up"),
            }
        }
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_every_category() {
        let aggregator = Aggregator::new(
            vec![
                StubSource::ok("alpha", json!({"n": 1})),
                StubSource::failing("beta", "probe refused"),
                StubSource::ok("gamma", json!({"n": 3})),
                StubSource::failing("delta", "no signal"),
            ],
            Duration::from_millis(500),
        );

        let snapshot = aggregator.collect().await;
        assert_eq!(snapshot.categories.len(), 4);
        assert_eq!(snapshot.failed_categories(), vec!["beta", "delta"]);
        assert_eq!(snapshot.category("alpha").unwrap()["n"], json!(1));
        assert!(!snapshot.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_marked_timed_out() {
        let aggregator = Aggregator::new(
            vec![
                StubSource::ok("fast", json!({"ok": true})),
                StubSource::hanging("slow", Duration::from_secs(60)),
            ],
            Duration::from_millis(3_000),
        );

        let snapshot = aggregator.collect().await;
        assert_eq!(snapshot.failed_categories(), vec!["slow"]);
        let marker = snapshot.category("slow").unwrap();
        assert!(marker["message"]
            .as_str()
            .unwrap()
            .contains("timed out after 3000ms"));
        assert!(snapshot.category("fast").unwrap()["ok"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn test_panicking_source_is_isolated() {
        let aggregator = Aggregator::new(
            vec![
                StubSource::panicking("angry"),
                StubSource::ok("calm", json!({"fine": true})),
            ],
            Duration::from_millis(500),
        );

        let snapshot = aggregator.collect().await;
        assert_eq!(snapshot.failed_categories(), vec!["angry"]);
        assert!(Snapshot::is_error_marker(
            snapshot.category("angry").unwrap()
        ));
        assert!(snapshot.category("calm").unwrap()["fine"].as_bool().unwrap());
    }

    #[tokio::test]
    async fn test_category_set_is_deterministic() {
        let build = || {
            Aggregator::new(
                vec![
                    StubSource::ok("zeta", json!(1)),
                    StubSource::ok("alpha", json!(2)),
                ],
                Duration::from_millis(500),
            )
        };

        let first = build().collect().await;
        let second = build().collect().await;
        assert_eq!(first.category_names(), vec!["alpha", "zeta"]);
        assert_eq!(first.category_names(), second.category_names());
        assert_ne!(first.collection_id, second.collection_id);
    }

    #[tokio::test]
    async fn test_full_pass_merges_auxiliary_sources() {
        let aggregator = Aggregator::new(
            vec![StubSource::ok("core", json!(1))],
            Duration::from_millis(500),
        )
        .with_auxiliary(vec![StubSource::ok("aux", json!(2))]);

        let core_only = aggregator.collect().await;
        assert_eq!(core_only.category_names(), vec!["core"]);

        let full = aggregator.collect_full().await;
        assert_eq!(full.category_names(), vec!["aux", "core"]);
    }

    #[tokio::test]
    async fn test_snapshot_metadata() {
        let aggregator = Aggregator::new(
            vec![StubSource::ok("one", json!(1))],
            Duration::from_millis(100),
        );

        let snapshot = aggregator.collect().await;
        assert_eq!(snapshot.collector_version, env!("CARGO_PKG_VERSION"));
        assert!(Uuid::parse_str(&snapshot.collection_id).is_ok());
    }
}
