//! Prometheus metrics for the sidecar.
//!
//! All metrics carry a `chain_id` label. A disabled handle is a no-op so
//! call sites never branch on whether metrics are wired up.

use std::sync::{atomic::AtomicU64, Arc};

use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ChainLabels {
    chain_id: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct FetchLabels {
    chain_id: String,
    result: String,
}

#[derive(Debug)]
struct Inner {
    chain_id: String,
    latest_round: Family<ChainLabels, Gauge>,
    fetches: Family<FetchLabels, Counter>,
    process_healthy: Family<ChainLabels, Gauge>,
    time_since_last_success: Family<ChainLabels, Gauge<f64, AtomicU64>>,
}

/// Cheap-to-clone metrics handle; `nop` when metrics are disabled.
#[derive(Clone, Default, Debug)]
pub struct SidecarMetrics {
    inner: Option<Arc<Inner>>,
}

impl SidecarMetrics {
    /// A handle that records nothing.
    pub fn nop() -> Self {
        Self::default()
    }

    /// Register the sidecar metrics under the given registry (callers pass a
    /// registry prefixed with the app namespace).
    pub fn new(chain_id: &str, registry: &mut Registry) -> Self {
        let latest_round = Family::<ChainLabels, Gauge>::default();
        registry.register(
            "vrf_drand_latest_round",
            "Latest successfully verified drand round served by the VRF sidecar",
            latest_round.clone(),
        );

        let fetches = Family::<FetchLabels, Counter>::default();
        registry.register(
            "vrf_drand_fetch",
            "Count of drand fetch attempts grouped by result",
            fetches.clone(),
        );

        let process_healthy = Family::<ChainLabels, Gauge>::default();
        registry.register(
            "vrf_drand_process_healthy",
            "Health flag for drand subprocess (1 healthy, 0 unhealthy)",
            process_healthy.clone(),
        );

        let time_since_last_success = Family::<ChainLabels, Gauge<f64, AtomicU64>>::default();
        registry.register(
            "vrf_drand_time_since_last_successful_fetch_seconds",
            "Seconds since last successful drand fetch",
            time_since_last_success.clone(),
        );

        Self {
            inner: Some(Arc::new(Inner {
                chain_id: chain_id.to_string(),
                latest_round,
                fetches,
                process_healthy,
                time_since_last_success,
            })),
        }
    }

    fn chain_labels(inner: &Inner) -> ChainLabels {
        ChainLabels {
            chain_id: inner.chain_id.clone(),
        }
    }

    pub fn set_latest_round(&self, round: u64) {
        if let Some(inner) = &self.inner {
            inner
                .latest_round
                .get_or_create(&Self::chain_labels(inner))
                .set(round as i64);
        }
    }

    pub fn observe_fetch(&self, success: bool) {
        if let Some(inner) = &self.inner {
            let result = if success { "success" } else { "failure" };
            inner
                .fetches
                .get_or_create(&FetchLabels {
                    chain_id: inner.chain_id.clone(),
                    result: result.to_string(),
                })
                .inc();
        }
    }

    pub fn set_process_healthy(&self, healthy: bool) {
        if let Some(inner) = &self.inner {
            inner
                .process_healthy
                .get_or_create(&Self::chain_labels(inner))
                .set(if healthy { 1 } else { 0 });
        }
    }

    pub fn observe_time_since_last_success(&self, seconds: f64) {
        if let Some(inner) = &self.inner {
            inner
                .time_since_last_success
                .get_or_create(&Self::chain_labels(inner))
                .set(seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_metrics_do_not_panic() {
        let metrics = SidecarMetrics::nop();
        metrics.set_latest_round(5);
        metrics.observe_fetch(true);
        metrics.set_process_healthy(false);
        metrics.observe_time_since_last_success(1.5);
    }

    #[test]
    fn registered_metrics_appear_in_exposition() {
        let mut registry = Registry::with_prefix("app");
        let metrics = SidecarMetrics::new("vrf-test-1", &mut registry);

        metrics.set_latest_round(1234);
        metrics.observe_fetch(true);
        metrics.observe_fetch(false);
        metrics.set_process_healthy(true);
        metrics.observe_time_since_last_success(2.5);

        let mut out = String::new();
        prometheus_client::encoding::text::encode(&mut out, &registry).unwrap();

        assert!(out.contains("app_vrf_drand_latest_round"));
        assert!(out.contains("app_vrf_drand_fetch_total"));
        assert!(out.contains("app_vrf_drand_process_healthy"));
        assert!(out.contains("app_vrf_drand_time_since_last_successful_fetch_seconds"));
        assert!(out.contains("chain_id=\"vrf-test-1\""));
        assert!(out.contains("result=\"success\""));
    }
}
