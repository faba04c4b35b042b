//! Inference performance reports
//!
//! Nothing here is measured. A report is fabricated from the number of ready
//! shards a model has, so dashboards and the CLI have a stable shape to
//! render. Every report carries `synthetic: true`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default reporting window in seconds
pub const DEFAULT_WINDOW_SECS: u64 = 300;

/// Nominal throughput of one ready shard, requests per second
const REQUESTS_PER_SHARD: f64 = 25.0;

/// Nominal single-shard latency
const BASE_LATENCY_MS: f64 = 120.0;

/// Fabricated performance figures for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub model: String,

    /// Window the figures pretend to cover
    #[serde(rename = "windowSecs")]
    pub window_secs: u64,

    #[serde(rename = "readyShards")]
    pub ready_shards: usize,

    #[serde(rename = "requestsPerSecond")]
    pub requests_per_second: f64,

    #[serde(rename = "totalRequests")]
    pub total_requests: u64,

    #[serde(rename = "avgLatencyMs")]
    pub avg_latency_ms: f64,

    #[serde(rename = "p99LatencyMs")]
    pub p99_latency_ms: f64,

    #[serde(rename = "errorRate")]
    pub error_rate: f64,

    /// Always true: the values are not measurements
    pub synthetic: bool,

    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
}

impl PerformanceReport {
    /// Build a report for `ready_shards` ready shards over `window_secs`
    ///
    /// Throughput scales linearly with the shard count and latency shrinks
    /// with it. With no ready shards every figure is zero and the error rate
    /// is 1.0.
    pub fn synthesize(model: impl Into<String>, ready_shards: usize, window_secs: u64) -> Self {
        let (rps, avg, error_rate) = if ready_shards == 0 {
            (0.0, 0.0, 1.0)
        } else {
            let shards = ready_shards as f64;
            (
                REQUESTS_PER_SHARD * shards,
                BASE_LATENCY_MS / shards.sqrt(),
                0.0,
            )
        };

        Self {
            model: model.into(),
            window_secs,
            ready_shards,
            requests_per_second: rps,
            total_requests: (rps * window_secs as f64) as u64,
            avg_latency_ms: avg,
            p99_latency_ms: avg * 2.5,
            error_rate,
            synthetic: true,
            generated_at: Utc::now(),
        }
    }

    /// True when no shard could serve requests
    pub fn is_unavailable(&self) -> bool {
        self.ready_shards == 0
    }
}
