use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::Instant;

use super::DataSource;
use crate::error::Result;

/// Micro-benchmark probe.
///
/// Runs short hash and allocation workloads and reports per-operation
/// timings. The numbers characterize relative machine speed, not absolute
/// throughput, and vary with load.
pub struct PerformanceSource {
    iterations: u32,
}

impl PerformanceSource {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }
}

#[async_trait]
impl DataSource for PerformanceSource {
    fn category(&self) -> &str {
        "performance"
    }

    async fn collect(&self) -> Result<Value> {
        let (hash_ns_per_op, sample) = hash_benchmark(self.iterations);
        let (alloc_ns_per_op, alloc_bytes) = alloc_benchmark(self.iterations);

        Ok(json!({
            "iterations": self.iterations,
            "hash_ns_per_op": hash_ns_per_op,
            "alloc_ns_per_op": alloc_ns_per_op,
            "alloc_bytes": alloc_bytes,
            "sample": sample,
        }))
    }
}

/// SHA-256 chain over a random buffer; the digest feeds back each round
/// so no iteration can be elided.
fn hash_benchmark(iterations: u32) -> (u64, String) {
    let mut buffer = [0u8; 1024];
    rand::thread_rng().fill(&mut buffer[..]);

    let mut digest = [0u8; 32];
    let started = Instant::now();
    for _ in 0..iterations {
        let mut hasher = Sha256::new();
        hasher.update(buffer);
        hasher.update(digest);
        digest.copy_from_slice(&hasher.finalize());
    }
    let elapsed = started.elapsed();

    let ns_per_op = (elapsed.as_nanos() / u128::from(iterations)) as u64;
    (ns_per_op, hex::encode(&digest[..8]))
}

/// Vec allocation churn; returns total capacity so the loop has an output
fn alloc_benchmark(iterations: u32) -> (u64, u64) {
    let mut total_bytes = 0u64;
    let started = Instant::now();
    for i in 0..iterations {
        let size = ((i % 64) + 1) as usize * 16;
        let v: Vec<u8> = Vec::with_capacity(size);
        total_bytes += v.capacity() as u64;
    }
    let elapsed = started.elapsed();

    let ns_per_op = (elapsed.as_nanos() / u128::from(iterations)) as u64;
    (ns_per_op, total_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_performance_payload_shape() {
        let source = PerformanceSource::new(200);
        assert_eq!(source.category(), "performance");

        let payload = source.collect().await.unwrap();
        assert_eq!(payload["iterations"].as_u64().unwrap(), 200);
        assert!(payload["hash_ns_per_op"].is_u64());
        assert!(payload["alloc_bytes"].as_u64().unwrap() > 0);
        assert_eq!(payload["sample"].as_str().unwrap().len(), 16);
    }

    #[test]
    fn test_zero_iterations_clamped() {
        let source = PerformanceSource::new(0);
        assert_eq!(source.iterations, 1);
    }

    #[test]
    fn test_hash_benchmark_produces_distinct_samples() {
        let (_, a) = hash_benchmark(3);
        let (_, b) = hash_benchmark(3);
        assert_ne!(a, b);
    }
}
