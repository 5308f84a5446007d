use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use argus::collector::Aggregator;
use argus::error::{Result, SourceError};
use argus::sources::DataSource;

mock! {
    Probe {}

    #[async_trait]
    impl DataSource for Probe {
        fn category(&self) -> &str;
        async fn collect(&self) -> Result<Value>;
    }
}

fn healthy_probe(category: &str, payload: Value) -> Arc<dyn DataSource> {
    let mut probe = MockProbe::new();
    probe.expect_category().return_const(category.to_string());
    probe.expect_collect().returning(move || Ok(payload.clone()));
    Arc::new(probe)
}

fn failing_probe(category: &str, reason: &str) -> Arc<dyn DataSource> {
    let mut probe = MockProbe::new();
    probe.expect_category().return_const(category.to_string());
    let reason = reason.to_string();
    probe.expect_collect().returning(move || {
        Err(SourceError::Probe {
            reason: reason.clone(),
        }
        .into())
    });
    Arc::new(probe)
}

/// Probe that never finishes inside any reasonable budget
struct StalledProbe;

#[async_trait]
impl DataSource for StalledProbe {
    fn category(&self) -> &str {
        "stalled"
    }

    async fn collect(&self) -> Result<Value> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Ok(Value::Null)
    }
}

/// A pass over sources with mixed outcomes settles every category: healthy
/// payloads stay intact while failed and stalled probes get error markers.
#[tokio::test(start_paused = true)]
async fn mixed_outcome_pass_settles_every_category() {
    let sources: Vec<Arc<dyn DataSource>> = vec![
        healthy_probe("hardware", json!({"cpu_count": 8})),
        healthy_probe("network", json!({"hostname": "unit-host"})),
        healthy_probe("runtime", json!({"pid": 4242})),
        failing_probe("entropy", "probe refused"),
        failing_probe("sensors", "no signal"),
        Arc::new(StalledProbe),
    ];
    let aggregator = Aggregator::new(sources, Duration::from_millis(400));

    let snapshot = aggregator.collect().await;

    assert_eq!(snapshot.categories.len(), 6);
    assert_eq!(
        snapshot.failed_categories(),
        vec!["entropy", "sensors", "stalled"]
    );
    assert!(!snapshot.is_complete());

    assert_eq!(snapshot.category("hardware").unwrap()["cpu_count"], 8);
    assert_eq!(
        snapshot.category("network").unwrap()["hostname"],
        "unit-host"
    );
    assert_eq!(snapshot.category("runtime").unwrap()["pid"], 4242);

    let entropy = snapshot.category("entropy").unwrap();
    assert_eq!(entropy["error"], true);
    assert!(entropy["message"].as_str().unwrap().contains("probe refused"));
    assert_eq!(
        snapshot.category("stalled").unwrap()["message"],
        "timed out after 400ms"
    );
}

#[tokio::test]
async fn all_healthy_pass_is_complete_with_fresh_metadata() {
    let sources: Vec<Arc<dyn DataSource>> = vec![
        healthy_probe("environment", json!({"user": "tester"})),
        healthy_probe("hardware", json!({"cpu_count": 4})),
        healthy_probe("network", json!({"hostname": "h"})),
        healthy_probe("runtime", json!({"pid": 1})),
        healthy_probe("system", json!({"os": "linux"})),
    ];
    let aggregator = Aggregator::new(sources, Duration::from_millis(500));

    let snapshot = aggregator.collect().await;

    assert!(snapshot.is_complete());
    assert_eq!(
        snapshot.category_names(),
        vec!["environment", "hardware", "network", "runtime", "system"]
    );
    assert_eq!(snapshot.collector_version, env!("CARGO_PKG_VERSION"));
    assert!(Uuid::parse_str(&snapshot.collection_id).is_ok());
}

#[tokio::test]
async fn repeat_passes_keep_categories_and_rotate_collection_ids() {
    let sources: Vec<Arc<dyn DataSource>> = vec![
        healthy_probe("hardware", json!({"cpu_count": 2})),
        healthy_probe("runtime", json!({"pid": 7})),
    ];
    let aggregator = Aggregator::new(sources, Duration::from_millis(500));

    let first = aggregator.collect().await;
    let second = aggregator.collect().await;

    assert_eq!(first.category_names(), second.category_names());
    assert_ne!(first.collection_id, second.collection_id);
    assert_eq!(
        first.category("hardware").unwrap(),
        second.category("hardware").unwrap()
    );
}

/// Auxiliary probes run only in full passes; the expectation counts verify
/// each probe ran exactly as many times as the pass mix demands.
#[tokio::test]
async fn collect_full_runs_auxiliary_probes_once_per_full_pass() {
    let mut core = MockProbe::new();
    core.expect_category().return_const("core".to_string());
    core.expect_collect()
        .times(2)
        .returning(|| Ok(json!({"core": true})));

    let mut aux = MockProbe::new();
    aux.expect_category().return_const("aux".to_string());
    aux.expect_collect()
        .times(1)
        .returning(|| Ok(json!({"aux": true})));

    let aggregator = Aggregator::new(vec![Arc::new(core)], Duration::from_millis(500))
        .with_auxiliary(vec![Arc::new(aux)]);

    let core_only = aggregator.collect().await;
    assert_eq!(core_only.category_names(), vec!["core"]);

    let full = aggregator.collect_full().await;
    assert_eq!(full.category_names(), vec!["aux", "core"]);
    assert_eq!(full.category("aux").unwrap()["aux"], true);
}
