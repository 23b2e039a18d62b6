pub mod policy;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ClientError;

/// Result of one network fetch, shared between every caller that joined it.
pub type FetchOutcome = Result<Arc<Value>, Arc<ClientError>>;

/// Re-callable network fetch for one resource.
pub type QueryFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Value, ClientError>> + Send + Sync>;

/// Identity of a cached resource: endpoint id plus its ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    endpoint: &'static str,
    params: Vec<String>,
}

impl ResourceKey {
    pub fn new(endpoint: &'static str, params: Vec<String>) -> Self {
        Self { endpoint, params }
    }

    pub fn bare(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            params: Vec::new(),
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(formatter, "{}", self.endpoint)
        } else {
            write!(formatter, "{}[{}]", self.endpoint, self.params.join(","))
        }
    }
}

/// Per-resource staleness policy. `poll_interval` drives the background
/// refresh tick while a watcher is mounted; `stale_after` decides whether a
/// read can be served from the slot without a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    pub stale_after: Duration,
    pub poll_interval: Option<Duration>,
}

impl QueryPolicy {
    pub const fn polled(interval: Duration) -> Self {
        Self {
            stale_after: interval,
            poll_interval: Some(interval),
        }
    }

    pub const fn on_demand() -> Self {
        Self {
            stale_after: Duration::MAX,
            poll_interval: None,
        }
    }
}

/// Read-only view of one slot for UI consumption: the value survives fetch
/// failures, the error is scoped to this key alone.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub value: Option<Arc<Value>>,
    pub error: Option<String>,
    pub pending: bool,
    pub stale: bool,
}

#[derive(Default)]
struct CacheSlot {
    value: Option<Arc<Value>>,
    last_fetched: Option<Instant>,
    stale_after: Duration,
    invalidated: bool,
    error: Option<String>,
    next_seq: u64,
    last_applied_seq: u64,
    inflight: Option<(u64, broadcast::Sender<FetchOutcome>)>,
}

impl CacheSlot {
    fn is_fresh(&self) -> bool {
        self.value.is_some()
            && !self.invalidated
            && self
                .last_fetched
                .map(|fetched| fetched.elapsed() < self.stale_after)
                .unwrap_or(false)
    }
}

enum FetchRole {
    Fresh(Arc<Value>),
    Follow(broadcast::Receiver<FetchOutcome>),
    Lead {
        seq: u64,
        sender: broadcast::Sender<FetchOutcome>,
    },
}

/// Deduplicates and schedules fetches per logical resource. Values are
/// replaced wholesale on success, never merged; a failed fetch leaves the
/// previous value readable and records the error on that key only.
#[derive(Default)]
pub struct QueryCache {
    slots: Mutex<HashMap<ResourceKey, CacheSlot>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh value, or a fetch. A fetch already pending for this key is
    /// joined, never duplicated.
    pub async fn read(
        &self,
        key: ResourceKey,
        policy: QueryPolicy,
        fetcher: QueryFetcher,
    ) -> Result<Arc<Value>, ClientError> {
        self.fetch(key, policy, fetcher, false).await
    }

    /// Always issues a network call (the manual-refresh path). A response is
    /// applied only if no later-issued response for this key already landed.
    pub async fn refetch(
        &self,
        key: ResourceKey,
        policy: QueryPolicy,
        fetcher: QueryFetcher,
    ) -> Result<Arc<Value>, ClientError> {
        self.fetch(key, policy, fetcher, true).await
    }

    async fn fetch(
        &self,
        key: ResourceKey,
        policy: QueryPolicy,
        fetcher: QueryFetcher,
        force: bool,
    ) -> Result<Arc<Value>, ClientError> {
        let role = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_default();
            slot.stale_after = policy.stale_after;
            if !force && slot.is_fresh() {
                match &slot.value {
                    Some(value) => FetchRole::Fresh(Arc::clone(value)),
                    None => FetchRole::Fresh(Arc::new(Value::Null)),
                }
            } else if let (false, Some((_, sender))) = (force, &slot.inflight) {
                FetchRole::Follow(sender.subscribe())
            } else {
                let seq = slot.next_seq;
                slot.next_seq += 1;
                let (sender, _) = broadcast::channel(4);
                slot.inflight = Some((seq, sender.clone()));
                FetchRole::Lead { seq, sender }
            }
        };

        match role {
            FetchRole::Fresh(value) => Ok(value),
            FetchRole::Follow(mut receiver) => match receiver.recv().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(ClientError::Shared(error)),
                Err(_) => Err(ClientError::Shared(Arc::new(ClientError::Logical(
                    "in-flight fetch was abandoned".to_string(),
                )))),
            },
            FetchRole::Lead { seq, sender } => {
                let guard = InflightGuard {
                    cache: self,
                    key: &key,
                    seq,
                    armed: true,
                };
                let result = fetcher().await;
                guard.disarm();
                match self.complete(&key, seq, sender, result) {
                    Ok(value) => Ok(value),
                    Err(error) => Err(ClientError::Shared(error)),
                }
            }
        }
    }

    /// Applies a finished fetch under the per-key sequence guard and wakes
    /// every follower with the shared outcome.
    fn complete(
        &self,
        key: &ResourceKey,
        seq: u64,
        sender: broadcast::Sender<FetchOutcome>,
        result: Result<Value, ClientError>,
    ) -> FetchOutcome {
        let outcome: FetchOutcome = match result {
            Ok(value) => Ok(Arc::new(value)),
            Err(error) => Err(Arc::new(error)),
        };

        {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_default();
            if slot
                .inflight
                .as_ref()
                .map(|(inflight_seq, _)| *inflight_seq == seq)
                .unwrap_or(false)
            {
                slot.inflight = None;
            }
            if seq >= slot.last_applied_seq {
                slot.last_applied_seq = seq;
                match &outcome {
                    Ok(value) => {
                        slot.value = Some(Arc::clone(value));
                        slot.last_fetched = Some(Instant::now());
                        slot.invalidated = false;
                        slot.error = None;
                    }
                    Err(error) => {
                        slot.error = Some(error.to_string());
                    }
                }
            } else {
                debug!(%key, seq, last_applied = slot.last_applied_seq, "discarding out-of-order response");
            }
        }

        let _ = sender.send(outcome.clone());
        outcome
    }

    /// Marks the key stale so its next read refetches. The current value
    /// stays readable until then.
    pub fn invalidate(&self, key: &ResourceKey) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key.clone()).or_default();
        slot.invalidated = true;
    }

    pub fn snapshot(&self, key: &ResourceKey) -> Option<CacheSnapshot> {
        let slots = self.slots.lock();
        slots.get(key).map(|slot| CacheSnapshot {
            value: slot.value.clone(),
            error: slot.error.clone(),
            pending: slot.inflight.is_some(),
            stale: !slot.is_fresh(),
        })
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Background refresh loop for a mounted watcher. Each tick drives a
    /// `read`, so a still-fresh slot is left alone and a pending fetch is
    /// joined instead of duplicated. The first tick fires immediately and
    /// primes the slot.
    pub fn spawn_poll(
        self: &Arc<Self>,
        key: ResourceKey,
        policy: QueryPolicy,
        fetcher: QueryFetcher,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let Some(interval) = policy.poll_interval else {
                return;
            };
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(error) = cache
                            .read(key.clone(), policy, Arc::clone(&fetcher))
                            .await
                        {
                            debug!(%key, %error, "background refresh failed");
                        }
                    }
                }
            }
        })
    }
}

/// Clears the in-flight marker when a leading fetch future is dropped before
/// completion, so the key cannot get stuck pending forever.
struct InflightGuard<'a> {
    cache: &'a QueryCache,
    key: &'a ResourceKey,
    seq: u64,
    armed: bool,
}

impl InflightGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.cache.slots.lock();
        if let Some(slot) = slots.get_mut(self.key) {
            if slot
                .inflight
                .as_ref()
                .map(|(seq, _)| *seq == self.seq)
                .unwrap_or(false)
            {
                slot.inflight = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
        delay: Duration,
        value: Value,
    ) -> QueryFetcher {
        Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            .boxed()
        })
    }

    fn failing_fetcher() -> QueryFetcher {
        Arc::new(|| async { Err(ClientError::EndpointNotFound) }.boxed())
    }

    fn key(endpoint: &'static str) -> ResourceKey {
        ResourceKey::bare(endpoint)
    }

    const TEST_POLICY: QueryPolicy = QueryPolicy::polled(Duration::from_secs(30));

    #[tokio::test]
    async fn concurrent_reads_share_one_network_call() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(Arc::clone(&calls), Duration::from_millis(50), json!(7));

        let (first, second) = tokio::join!(
            cache.read(key("/api/scan/status"), TEST_POLICY, Arc::clone(&fetcher)),
            cache.read(key("/api/scan/status"), TEST_POLICY, Arc::clone(&fetcher)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*first.unwrap(), json!(7));
        assert_eq!(*second.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn fresh_value_is_served_without_refetching() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(Arc::clone(&calls), Duration::ZERO, json!(1));
        let key = key("/api/get_active_alerts");

        cache.read(key.clone(), TEST_POLICY, Arc::clone(&fetcher)).await.unwrap();
        cache.read(key.clone(), TEST_POLICY, Arc::clone(&fetcher)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&key);
        cache.read(key, TEST_POLICY, fetcher).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_preserves_previous_value_for_that_key_only() {
        let cache = QueryCache::new();
        let positions = key("/api/paper-trades");
        let alerts = key("/api/get_active_alerts");

        let seed = counting_fetcher(Arc::new(AtomicUsize::new(0)), Duration::ZERO, json!([{"id": "t-1"}]));
        cache.read(positions.clone(), TEST_POLICY, Arc::clone(&seed)).await.unwrap();
        cache.read(alerts.clone(), TEST_POLICY, seed).await.unwrap();

        cache.invalidate(&positions);
        let error = cache
            .read(positions.clone(), TEST_POLICY, failing_fetcher())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "API endpoint not found");

        let broken = cache.snapshot(&positions).unwrap();
        assert_eq!(*broken.value.unwrap(), json!([{"id": "t-1"}]));
        assert_eq!(broken.error.as_deref(), Some("API endpoint not found"));

        let untouched = cache.snapshot(&alerts).unwrap();
        assert!(untouched.error.is_none());
        assert!(!untouched.stale);
    }

    #[tokio::test]
    async fn out_of_order_response_is_discarded() {
        let cache = Arc::new(QueryCache::new());
        let key = key("/api/market");

        let slow = counting_fetcher(
            Arc::new(AtomicUsize::new(0)),
            Duration::from_millis(200),
            json!("old"),
        );
        let fast = counting_fetcher(
            Arc::new(AtomicUsize::new(0)),
            Duration::from_millis(10),
            json!("new"),
        );

        let slow_cache = Arc::clone(&cache);
        let slow_key = key.clone();
        let slow_task = tokio::spawn(async move {
            slow_cache.refetch(slow_key, TEST_POLICY, slow).await
        });
        // The slow request must grab the earlier sequence number.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let fast_value = cache.refetch(key.clone(), TEST_POLICY, fast).await.unwrap();
        assert_eq!(*fast_value, json!("new"));

        // The slower, earlier-issued response resolves to its caller but must
        // not overwrite the later one in the cache.
        let slow_value = slow_task.await.unwrap().unwrap();
        assert_eq!(*slow_value, json!("old"));
        let snapshot = cache.snapshot(&key).unwrap();
        assert_eq!(*snapshot.value.unwrap(), json!("new"));
    }

    #[tokio::test]
    async fn snapshot_reports_pending_fetch() {
        let cache = Arc::new(QueryCache::new());
        let key = key("/api/candles");
        let fetcher = counting_fetcher(
            Arc::new(AtomicUsize::new(0)),
            Duration::from_millis(150),
            json!([]),
        );

        let reader_cache = Arc::clone(&cache);
        let reader_key = key.clone();
        let reader =
            tokio::spawn(
                async move { reader_cache.read(reader_key, TEST_POLICY, fetcher).await },
            );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.snapshot(&key).unwrap().pending);

        reader.await.unwrap().unwrap();
        let settled = cache.snapshot(&key).unwrap();
        assert!(!settled.pending);
        assert!(!settled.stale);
    }

    #[tokio::test]
    async fn poll_task_refreshes_stale_entries_until_cancelled() {
        let cache = Arc::new(QueryCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(Arc::clone(&calls), Duration::ZERO, json!(0));
        let policy = QueryPolicy::polled(Duration::from_millis(50));
        let cancel = CancellationToken::new();

        let poll = cache.spawn_poll(key("/api/market-scan"), policy, fetcher, cancel.clone());
        tokio::time::sleep(Duration::from_millis(180)).await;
        cancel.cancel();
        let _ = poll.await;

        let observed = calls.load(Ordering::SeqCst);
        assert!(observed >= 2, "expected repeated refreshes, saw {observed}");
    }

    #[tokio::test]
    async fn on_demand_policy_never_expires_without_invalidation() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = counting_fetcher(Arc::clone(&calls), Duration::ZERO, json!({}));
        let key = key("/api/pattern-stats");

        cache
            .read(key.clone(), QueryPolicy::on_demand(), Arc::clone(&fetcher))
            .await
            .unwrap();
        cache
            .read(key.clone(), QueryPolicy::on_demand(), Arc::clone(&fetcher))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&key);
        cache.read(key, QueryPolicy::on_demand(), fetcher).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
