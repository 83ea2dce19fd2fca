use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::BwsConfig;
use crate::rpc::transport::{BwsTransport, HttpBwsTransport};

struct Region {
    label: String,
    transport: Arc<dyn BwsTransport>,
    consecutive_failures: u32,
    consecutive_successes: u32,
    healthy: bool,
}

/// Regional failover over the primary and secondary BWS endpoints (spec
/// §4.1.2): probes the preferred region every 30s, demotes it after 3
/// consecutive failed probes, and re-promotes it after 2 consecutive
/// successes. Grounded on the teacher's `Arc<RwLock<HashMap<...>>>` registry
/// shape in `app/jobs/queue_worker.rs`.
pub struct RegionPool {
    regions: RwLock<Vec<Region>>,
    unhealthy_after: u32,
    recover_after: u32,
}

impl RegionPool {
    pub fn new(config: &BwsConfig) -> Self {
        let mut regions = vec![Region {
            label: "primary".to_string(),
            transport: Arc::new(HttpBwsTransport::new(config.primary_endpoint.clone(), config.request_timeout)),
            consecutive_failures: 0,
            consecutive_successes: 0,
            healthy: true,
        }];
        for (i, endpoint) in config.secondary_endpoints.iter().enumerate() {
            regions.push(Region {
                label: format!("secondary-{i}"),
                transport: Arc::new(HttpBwsTransport::new(endpoint.clone(), config.request_timeout)),
                consecutive_failures: 0,
                consecutive_successes: 0,
                healthy: true,
            });
        }

        RegionPool {
            regions: RwLock::new(regions),
            unhealthy_after: config.failover_unhealthy_after,
            recover_after: config.failover_recover_after,
        }
    }

    /// Builds a pool around a single caller-supplied transport, bypassing
    /// region configuration entirely. Used to plug in a non-HTTP
    /// `BwsTransport` (a test double, or a transport over some other wire
    /// format) without going through `BwsConfig`.
    pub fn single(transport: Arc<dyn BwsTransport>) -> Self {
        RegionPool {
            regions: RwLock::new(vec![Region {
                label: "single".to_string(),
                transport,
                consecutive_failures: 0,
                consecutive_successes: 0,
                healthy: true,
            }]),
            unhealthy_after: u32::MAX,
            recover_after: 0,
        }
    }

    /// The transport to issue the next call against: the first healthy
    /// region in preference order, falling back to the least-recently-failed
    /// region if every region is currently marked unhealthy.
    pub async fn active(&self) -> (String, Arc<dyn BwsTransport>) {
        let regions = self.regions.read().await;
        if let Some(region) = regions.iter().find(|r| r.healthy) {
            return (region.label.clone(), region.transport.clone());
        }
        let region = regions.first().expect("pool always has a primary region");
        (region.label.clone(), region.transport.clone())
    }

    /// Called after a health probe against `label` to update its streaks and
    /// flip its healthy/unhealthy state per the thresholds above.
    pub async fn record_probe(&self, label: &str, probe_succeeded: bool) {
        let mut regions = self.regions.write().await;
        let Some(region) = regions.iter_mut().find(|r| r.label == label) else {
            return;
        };

        if probe_succeeded {
            region.consecutive_successes += 1;
            region.consecutive_failures = 0;
            if !region.healthy && region.consecutive_successes >= self.recover_after {
                region.healthy = true;
                tracing::info!(region = %label, "BWS region recovered");
            }
        } else {
            region.consecutive_failures += 1;
            region.consecutive_successes = 0;
            if region.healthy && region.consecutive_failures >= self.unhealthy_after {
                region.healthy = false;
                tracing::warn!(region = %label, "BWS region marked unhealthy");
            }
        }
    }

    pub async fn region_labels(&self) -> Vec<String> {
        self.regions.read().await.iter().map(|r| r.label.clone()).collect()
    }
}
