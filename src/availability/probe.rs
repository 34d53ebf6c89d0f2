//! Rate-limited reachability probes
//!
//! Probes hit real hardware on the home network, so every result is cached in
//! the [`AvailabilityRegistry`] for a TTL and concurrent callers for the same
//! service share a single in-flight probe.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use super::AvailabilityRegistry;
use crate::clock::SharedClock;
use crate::error::ProbeFailure;
use crate::types::ServiceAvailability;

/// Cheap "is it there" call against one service
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    async fn check(&self) -> std::result::Result<(), ProbeFailure>;
}

/// GET a status URL; any 2xx counts as reachable
pub struct HttpReachability {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpReachability {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    /// Config endpoint of a lighting bridge
    pub fn hue_bridge(bridge_ip: &str, username: &str, timeout: Duration) -> Self {
        Self::new(format!("http://{}/api/{}/config", bridge_ip, username), timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReachabilityCheck for HttpReachability {
    async fn check(&self) -> std::result::Result<(), ProbeFailure> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeFailure::new(format!("timed out after {}ms", self.timeout.as_millis()))
                } else if e.is_connect() {
                    ProbeFailure::new(format!("connection failed: {}", e))
                } else {
                    ProbeFailure::new(e.to_string())
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeFailure::new(format!("HTTP {}", response.status())))
        }
    }
}

struct RegisteredCheck {
    check: Arc<dyn ReachabilityCheck>,
    ttl: Duration,
}

/// Performs probes and records every outcome in the registry
pub struct ServiceProbe {
    registry: Arc<AvailabilityRegistry>,
    clock: SharedClock,
    timeout: Duration,
    /// One gate per service name; holders of the gate own the in-flight probe
    in_flight: DashMap<String, Arc<AsyncMutex<()>>>,
    registered: RwLock<BTreeMap<String, RegisteredCheck>>,
}

impl ServiceProbe {
    pub fn new(registry: Arc<AvailabilityRegistry>, clock: SharedClock, timeout: Duration) -> Self {
        Self {
            registry,
            clock,
            timeout,
            in_flight: DashMap::new(),
            registered: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<AvailabilityRegistry> {
        &self.registry
    }

    /// Remember a check so it can be re-run by name
    pub fn register(&self, service_name: impl Into<String>, check: Arc<dyn ReachabilityCheck>, ttl: Duration) {
        self.registered
            .write()
            .insert(service_name.into(), RegisteredCheck { check, ttl });
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.registered.read().keys().cloned().collect()
    }

    fn fresh_record(&self, service_name: &str, ttl: Duration) -> Option<ServiceAvailability> {
        let now = self.clock.now();
        self.registry
            .get(service_name)
            .filter(|record| record.is_fresh(now, ttl))
    }

    /// Return the cached record if younger than `ttl`, otherwise run `check`.
    ///
    /// Never fails: an unreachable service is reported as `available = false`
    /// with the reason in `error`.
    pub async fn check_availability(
        &self,
        service_name: &str,
        check: &dyn ReachabilityCheck,
        ttl: Duration,
    ) -> ServiceAvailability {
        if let Some(record) = self.fresh_record(service_name, ttl) {
            tracing::debug!("Probe cache hit for {}", service_name);
            return record;
        }

        let gate = self
            .in_flight
            .entry(service_name.to_string())
            .or_default()
            .clone();
        let _held = gate.lock().await;

        // Another caller may have finished a probe while we waited
        if let Some(record) = self.fresh_record(service_name, ttl) {
            return record;
        }

        let outcome = tokio::time::timeout(self.timeout, check.check()).await;
        let now = self.clock.now();
        let record = match outcome {
            Ok(Ok(())) => ServiceAvailability::up(service_name, now),
            Ok(Err(failure)) => ServiceAvailability::down(service_name, now, failure.0),
            Err(_) => ServiceAvailability::down(
                service_name,
                now,
                format!("timed out after {}ms", self.timeout.as_millis()),
            ),
        };

        let previous = self.registry.get(service_name);
        let flipped = previous.as_ref().map(|p| p.available) != Some(record.available);
        match (&record.error, flipped) {
            (None, true) => tracing::info!("Service {} is reachable", service_name),
            (Some(reason), true) => {
                tracing::info!("Service {} is unreachable: {}", service_name, reason)
            }
            (Some(reason), false) => {
                tracing::debug!("Service {} still unreachable: {}", service_name, reason)
            }
            (None, false) => tracing::debug!("Service {} still reachable", service_name),
        }

        self.registry.set(service_name, record.clone());
        record
    }

    /// Probe one registered service, respecting its TTL
    pub async fn probe(&self, service_name: &str) -> Option<ServiceAvailability> {
        let (check, ttl) = {
            let registered = self.registered.read();
            let entry = registered.get(service_name)?;
            (entry.check.clone(), entry.ttl)
        };
        Some(self.check_availability(service_name, check.as_ref(), ttl).await)
    }

    /// Probe every registered service concurrently
    pub async fn probe_registered(&self) -> BTreeMap<String, ServiceAvailability> {
        let names = self.registered_names();
        self.probe_many(names).await
    }

    /// Probe only the registered local-capability indicators
    pub async fn probe_indicators(&self) -> BTreeMap<String, ServiceAvailability> {
        let names: Vec<String> = self
            .registered_names()
            .into_iter()
            .filter(|name| self.registry.is_local_indicator(name))
            .collect();
        self.probe_many(names).await
    }

    async fn probe_many(&self, names: Vec<String>) -> BTreeMap<String, ServiceAvailability> {
        let probes = names.iter().map(|name| self.probe(name));
        let results = futures::future::join_all(probes).await;
        names
            .into_iter()
            .zip(results)
            .filter_map(|(name, record)| record.map(|r| (name, r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SpyCheck {
        calls: AtomicUsize,
        reachable: parking_lot::Mutex<bool>,
        delay: Duration,
    }

    impl SpyCheck {
        fn new(reachable: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reachable: parking_lot::Mutex::new(reachable),
                delay: Duration::from_millis(0),
            })
        }

        fn slow(reachable: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reachable: parking_lot::Mutex::new(reachable),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReachabilityCheck for SpyCheck {
        async fn check(&self) -> std::result::Result<(), ProbeFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if *self.reachable.lock() {
                Ok(())
            } else {
                Err(ProbeFailure::new("bridge did not answer"))
            }
        }
    }

    fn setup() -> (ServiceProbe, ManualClock) {
        let clock = ManualClock::default();
        let probe = ServiceProbe::new(
            Arc::new(AvailabilityRegistry::default()),
            Arc::new(clock.clone()),
            Duration::from_secs(2),
        );
        (probe, clock)
    }

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_repeat_within_ttl_uses_cache() {
        let (probe, clock) = setup();
        let spy = SpyCheck::new(true);

        let first = probe.check_availability("lighting", spy.as_ref(), TTL).await;
        clock.advance(chrono::Duration::seconds(10));
        let second = probe.check_availability("lighting", spy.as_ref(), TTL).await;

        assert_eq!(spy.calls(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_record_is_reprobed() {
        let (probe, clock) = setup();
        let spy = SpyCheck::new(true);

        probe.check_availability("lighting", spy.as_ref(), TTL).await;
        clock.advance(chrono::Duration::seconds(31));
        *spy.reachable.lock() = false;
        let record = probe.check_availability("lighting", spy.as_ref(), TTL).await;

        assert_eq!(spy.calls(), 2);
        assert!(!record.available);
        assert_eq!(record.error.as_deref(), Some("bridge did not answer"));
        assert!(!probe.registry().is_available("lighting"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_first_probes_share_one_call() {
        let (probe, _clock) = setup();
        let spy = SpyCheck::slow(true, Duration::from_millis(200));

        let calls = (0..16).map(|_| probe.check_availability("lighting", spy.as_ref(), TTL));
        let records = futures::future::join_all(calls).await;

        assert_eq!(spy.calls(), 1);
        assert!(records.iter().all(|r| r.available));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_check_times_out_as_unavailable() {
        let (probe, _clock) = setup();
        let spy = SpyCheck::slow(true, Duration::from_secs(60));

        let record = probe.check_availability("lighting", spy.as_ref(), TTL).await;

        assert!(!record.available);
        assert!(record.error.unwrap().contains("timed out"));
        assert!(record.checked_at.is_some());
    }

    #[tokio::test]
    async fn test_probe_indicators_skips_other_services() {
        let (probe, _clock) = setup();
        let lighting = SpyCheck::new(true);
        let transit = SpyCheck::new(true);
        probe.register("lighting", lighting.clone(), TTL);
        probe.register("transit", transit.clone(), TTL);

        let results = probe.probe_indicators().await;

        assert_eq!(results.len(), 1);
        assert_eq!(lighting.calls(), 1);
        assert_eq!(transit.calls(), 0);
        assert!(probe.registry().any_local_service_available());
    }

    #[tokio::test]
    async fn test_probe_unknown_service_returns_none() {
        let (probe, _clock) = setup();
        assert!(probe.probe("desktop").await.is_none());
    }
}
