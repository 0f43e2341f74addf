//! Unified fetch layer: response caching, in-flight deduplication and
//! bounded retry with exponential backoff.
//!
//! Every key is in at most one of three tables at a time: the success cache,
//! the failure table (cooldown) or the pending table. All checks and the
//! matching insert for a key happen under a single lock acquisition, and the
//! lock is never held across an `.await`.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::domain::errors::FetchError;
use crate::domain::ports::{
    HttpTransport, RequestDescriptor, ResponseShape, TransportError, TransportResponse,
};

/// Default number of successful responses kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON document.
    Json(serde_json::Value),
    /// HTML page source.
    Html(String),
    /// The provider refused the request with a non-retryable status.
    Rejected {
        /// HTTP status code.
        status: u16,
    },
}

impl Payload {
    /// JSON body, if this is one.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// HTML body, if this is one.
    #[must_use]
    pub fn as_html(&self) -> Option<&str> {
        match self {
            Self::Html(html) => Some(html),
            _ => None,
        }
    }
}

/// Timing and retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a successful response stays fresh.
    pub ttl: Duration,
    /// How long a failed key is refused without touching the network.
    pub cooldown: Duration,
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry.
    pub retry_base: Duration,
    /// Time budget of a single attempt.
    pub request_timeout: Duration,
    /// Maximum number of cached successes.
    pub capacity: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120),
            cooldown: Duration::from_secs(30),
            max_attempts: 3,
            retry_base: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CachePolicy {
    /// Delay after failed attempt `attempt` (1-based): `retry_base * 2^(attempt - 1)`.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_base.saturating_mul(1 << exponent)
    }
}

/// Observable state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntryState {
    /// Cached success younger than the TTL.
    Fresh,
    /// Cached success past the TTL; the next fetch goes to the network.
    Stale,
    /// Recent terminal failure still inside the cooldown window.
    FailedCooldown,
    /// A request is in flight.
    Pending,
}

/// Counters describing cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Answered from the success cache.
    pub hits: u64,
    /// Started a new request.
    pub misses: u64,
    /// Joined a request already in flight.
    pub joins: u64,
    /// Refused because of a recent failure.
    pub cooldown_rejections: u64,
    /// Individual network attempts, retries included.
    pub network_attempts: u64,
    /// Successes currently cached.
    pub size: usize,
    /// Failed keys still remembered for their cooldown.
    pub failures: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries, {} failed ({} hits, {} misses, {} joined, {} in cooldown, {} network attempts)",
            self.size,
            self.failures,
            self.hits,
            self.misses,
            self.joins,
            self.cooldown_rejections,
            self.network_attempts
        )
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Payload, FetchError>>>;

struct CacheTables {
    generation: u64,
    fresh: LruCache<String, (Instant, Payload)>,
    failures: HashMap<String, (Instant, FetchError)>,
    pending: HashMap<String, SharedFetch>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    joins: AtomicU64,
    cooldown_rejections: AtomicU64,
    network_attempts: AtomicU64,
}

struct CacheInner {
    transport: Arc<dyn HttpTransport>,
    policy: CachePolicy,
    tables: Mutex<CacheTables>,
    counters: Counters,
}

/// Shared request cache. Cheap to clone.
#[derive(Clone)]
pub struct RequestCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache")
            .field("policy", &self.inner.policy)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl RequestCache {
    /// Creates a cache issuing requests through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, policy: CachePolicy) -> Self {
        let capacity = NonZeroUsize::new(policy.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(CacheInner {
                transport,
                policy,
                tables: Mutex::new(CacheTables {
                    generation: 0,
                    fresh: LruCache::new(capacity),
                    failures: HashMap::new(),
                    pending: HashMap::new(),
                }),
                counters: Counters::default(),
            }),
        }
    }

    /// Timing and retry parameters in use.
    #[must_use]
    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Fetches `request`, answering from cache, joining an in-flight request,
    /// or going to the network with retries.
    ///
    /// # Errors
    /// Returns `FetchError::RecentFailure` inside the cooldown window, otherwise
    /// the terminal error of the (possibly shared) request.
    pub async fn fetch(&self, request: &RequestDescriptor) -> Result<Payload, FetchError> {
        let key = request.cache_key();
        let shared = {
            let mut tables = self.inner.tables.lock();
            let now = Instant::now();
            let policy = &self.inner.policy;

            if let Some((stored_at, payload)) = tables.fresh.get(&key)
                && now.duration_since(*stored_at) < policy.ttl
            {
                self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Request cache hit");
                return Ok(payload.clone());
            }

            if let Some(pending) = tables.pending.get(&key) {
                self.inner.counters.joins.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "Joining in-flight request");
                pending.clone()
            } else {
                if let Some((failed_at, _)) = tables.failures.get(&key) {
                    let elapsed = now.duration_since(*failed_at);
                    if elapsed < policy.cooldown {
                        self.inner
                            .counters
                            .cooldown_rejections
                            .fetch_add(1, Ordering::Relaxed);
                        let remaining = policy.cooldown.saturating_sub(elapsed);
                        debug!(key = %key, remaining_ms = duration_ms(remaining), "Key in failure cooldown");
                        return Err(FetchError::RecentFailure {
                            url: request.url().to_string(),
                            remaining_ms: duration_ms(remaining),
                        });
                    }
                    tables.failures.remove(&key);
                }

                self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                let fetch = Self::run(
                    Arc::clone(&self.inner),
                    key.clone(),
                    request.clone(),
                    tables.generation,
                )
                .boxed()
                .shared();
                tables.pending.insert(key, fetch.clone());
                fetch
            }
        };

        shared.await
    }

    /// Drops every cached success, failure and pending entry at once.
    ///
    /// Requests already in flight still complete for their callers but do not
    /// write their result back.
    pub fn clear(&self) {
        let mut tables = self.inner.tables.lock();
        tables.generation += 1;
        tables.fresh.clear();
        tables.failures.clear();
        tables.pending.clear();
        debug!(generation = tables.generation, "Cleared request cache");
    }

    /// Current state of the entry for `request`, if any.
    #[must_use]
    pub fn entry_state(&self, request: &RequestDescriptor) -> Option<CacheEntryState> {
        let key = request.cache_key();
        let tables = self.inner.tables.lock();
        let now = Instant::now();
        let policy = &self.inner.policy;

        if tables.pending.contains_key(&key) {
            return Some(CacheEntryState::Pending);
        }
        if let Some((stored_at, _)) = tables.fresh.peek(&key) {
            return Some(if now.duration_since(*stored_at) < policy.ttl {
                CacheEntryState::Fresh
            } else {
                CacheEntryState::Stale
            });
        }
        tables.failures.get(&key).and_then(|(failed_at, _)| {
            (now.duration_since(*failed_at) < policy.cooldown)
                .then_some(CacheEntryState::FailedCooldown)
        })
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        let tables = self.inner.tables.lock();
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            joins: counters.joins.load(Ordering::Relaxed),
            cooldown_rejections: counters.cooldown_rejections.load(Ordering::Relaxed),
            network_attempts: counters.network_attempts.load(Ordering::Relaxed),
            size: tables.fresh.len(),
            failures: tables.failures.len(),
        }
    }

    async fn run(
        inner: Arc<CacheInner>,
        key: String,
        request: RequestDescriptor,
        generation: u64,
    ) -> Result<Payload, FetchError> {
        let outcome = inner.fetch_with_retry(&request).await;
        inner.settle(&key, generation, &outcome);
        outcome
    }
}

impl CacheInner {
    async fn fetch_with_retry(&self, request: &RequestDescriptor) -> Result<Payload, FetchError> {
        let mut attempt: u32 = 1;
        loop {
            let result = self.attempt(request).await;
            match result {
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.retry_delay(attempt);
                    warn!(
                        url = %request.url(),
                        attempt,
                        delay_ms = duration_ms(delay),
                        error = %err,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn attempt(&self, request: &RequestDescriptor) -> Result<Payload, FetchError> {
        self.counters.network_attempts.fetch_add(1, Ordering::Relaxed);
        let url = request.url().to_string();
        let timeout = self.policy.request_timeout;

        match tokio::time::timeout(timeout, self.transport.execute(request)).await {
            Err(_) | Ok(Err(TransportError::Timeout)) => Err(FetchError::TransportTimeout {
                url,
                timeout_ms: duration_ms(timeout),
            }),
            Ok(Err(err)) => Err(FetchError::transport(url, err.to_string())),
            Ok(Ok(response)) => decode(request, &response),
        }
    }

    fn settle(&self, key: &str, generation: u64, outcome: &Result<Payload, FetchError>) {
        let mut tables = self.tables.lock();
        if tables.generation != generation {
            debug!(key = %key, "Dropping result of a request started before clear");
            return;
        }

        tables.pending.remove(key);
        let now = Instant::now();
        match outcome {
            Ok(payload) => {
                tables.failures.remove(key);
                tables.fresh.put(key.to_string(), (now, payload.clone()));
            }
            Err(err) => {
                let cooldown = self.policy.cooldown;
                tables.fresh.pop(key);
                tables
                    .failures
                    .retain(|_, (failed_at, _)| now.duration_since(*failed_at) < cooldown);
                tables.failures.insert(key.to_string(), (now, err.clone()));
            }
        }
    }
}

fn decode(request: &RequestDescriptor, response: &TransportResponse) -> Result<Payload, FetchError> {
    let url = request.url().as_str();
    if FetchError::is_retryable_status(response.status) {
        return Err(FetchError::ServerError {
            url: url.to_string(),
            status: response.status,
        });
    }
    if !response.is_success() {
        debug!(url, status = response.status, "Provider rejected request");
        return Ok(Payload::Rejected {
            status: response.status,
        });
    }

    match request.shape() {
        ResponseShape::Json => serde_json::from_slice(&response.body)
            .map(Payload::Json)
            .map_err(|e| FetchError::decode(url, e.to_string())),
        ResponseShape::Html => Ok(Payload::Html(
            String::from_utf8_lossy(&response.body).into_owned(),
        )),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::MockTransport;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use url::Url;

    const URL: &str = "https://api.example.com/video?id=abc";

    fn request() -> RequestDescriptor {
        RequestDescriptor::json(Url::parse(URL).unwrap())
    }

    fn setup() -> (Arc<MockTransport>, RequestCache) {
        let transport = Arc::new(MockTransport::new());
        let cache = RequestCache::new(transport.clone(), CachePolicy::default());
        (transport, cache)
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = CachePolicy::default();
        assert_eq!(policy.retry_delay(1), Duration::from_millis(500));
        assert_eq!(policy.retry_delay(2), Duration::from_millis(1000));
        assert_eq!(policy.retry_delay(3), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_skips_network() {
        let (transport, cache) = setup();
        transport.push_json(URL, &json!({"title": "a"}));

        let first = assert_ok!(cache.fetch(&request()).await);
        let second = assert_ok!(cache.fetch(&request()).await);

        assert_eq!(first, second);
        assert_eq!(transport.calls_for(URL), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.entry_state(&request()), Some(CacheEntryState::Fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let (transport, cache) = setup();
        transport.push_json(URL, &json!({"title": "a"}));

        assert_ok!(cache.fetch(&request()).await);
        tokio::time::advance(Duration::from_secs(121)).await;
        assert_eq!(cache.entry_state(&request()), Some(CacheEntryState::Stale));

        assert_ok!(cache.fetch(&request()).await);
        assert_eq!(transport.calls_for(URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_request() {
        let (transport, cache) = setup();
        transport.set_latency(Duration::from_millis(200));
        transport.push_json(URL, &json!({"id": 1}));

        let req = request();
        let (a, b, c) = tokio::join!(cache.fetch(&req), cache.fetch(&req), cache.fetch(&req));

        assert_eq!(transport.calls_for(URL), 1);
        assert_eq!(assert_ok!(a), Payload::Json(json!({"id": 1})));
        assert_eq!(assert_ok!(b), Payload::Json(json!({"id": 1})));
        assert_eq!(assert_ok!(c), Payload::Json(json!({"id": 1})));
        assert_eq!(cache.stats().joins, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_failure() {
        let (transport, cache) = setup();
        transport.set_latency(Duration::from_millis(50));
        transport.push_status(URL, 503);

        let req = request();
        let (a, b) = tokio::join!(cache.fetch(&req), cache.fetch(&req));

        assert_eq!(transport.calls_for(URL), 3);
        assert_eq!(assert_err!(a), assert_err!(b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_increasing_delay() {
        let (transport, cache) = setup();
        transport.push_status(URL, 503);
        transport.push_status(URL, 429);
        transport.push_json(URL, &json!({"ok": true}));

        let started = Instant::now();
        assert_ok!(cache.fetch(&request()).await);
        let elapsed = started.elapsed();

        assert_eq!(transport.calls_for(URL), 3);
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let (transport, cache) = setup();
        transport.push_status(URL, 404);

        let payload = assert_ok!(cache.fetch(&request()).await);

        assert_eq!(payload, Payload::Rejected { status: 404 });
        assert_eq!(transport.calls_for(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_key_waits_for_cooldown() {
        let (transport, cache) = setup();
        for _ in 0..3 {
            transport.push_status(URL, 503);
        }
        transport.push_json(URL, &json!({"ok": true}));

        let err = assert_err!(cache.fetch(&request()).await);
        assert!(matches!(err, FetchError::ServerError { status: 503, .. }));
        assert_eq!(transport.calls_for(URL), 3);
        assert_eq!(
            cache.entry_state(&request()),
            Some(CacheEntryState::FailedCooldown)
        );

        let err = assert_err!(cache.fetch(&request()).await);
        assert!(matches!(err, FetchError::RecentFailure { .. }));
        assert_eq!(transport.calls_for(URL), 3);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_ok!(cache.fetch(&request()).await);
        assert_eq!(transport.calls_for(URL), 4);
        assert_eq!(cache.entry_state(&request()), Some(CacheEntryState::Fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_failures_are_forgotten() {
        const OTHER: &str = "https://api.example.com/video?id=other";
        let (transport, cache) = setup();
        transport.push_status(URL, 504);
        transport.push_status(OTHER, 504);
        let other = RequestDescriptor::json(Url::parse(OTHER).unwrap());

        assert_err!(cache.fetch(&request()).await);
        assert_eq!(cache.stats().failures, 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_err!(cache.fetch(&other).await);

        assert_eq!(cache.stats().failures, 1);
        assert_eq!(cache.entry_state(&request()), None);
        assert_eq!(
            cache.entry_state(&other),
            Some(CacheEntryState::FailedCooldown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retryable() {
        let (transport, cache) = setup();
        transport.set_latency(Duration::from_secs(30));
        transport.push_json(URL, &json!({}));

        let err = assert_err!(cache.fetch(&request()).await);

        assert!(matches!(err, FetchError::TransportTimeout { timeout_ms: 10_000, .. }));
        assert_eq!(transport.calls_for(URL), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_is_terminal() {
        let (transport, cache) = setup();
        transport.push(URL, Ok(TransportResponse::new(200, "not json")));

        let err = assert_err!(cache.fetch(&request()).await);

        assert!(matches!(err, FetchError::Decode { .. }));
        assert_eq!(transport.calls_for(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_in_flight_result() {
        let (transport, cache) = setup();
        transport.set_latency(Duration::from_secs(1));
        transport.push_json(URL, &json!({"v": 1}));

        let task = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.fetch(&request()).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.entry_state(&request()), Some(CacheEntryState::Pending));

        cache.clear();
        assert_eq!(cache.entry_state(&request()), None);

        let result = task.await.unwrap();
        assert_ok!(result);
        assert_eq!(cache.entry_state(&request()), None);

        assert_ok!(cache.fetch(&request()).await);
        assert_eq!(transport.calls_for(URL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_display() {
        let (transport, cache) = setup();
        transport.push_json(URL, &json!({}));
        assert_ok!(cache.fetch(&request()).await);

        let text = cache.stats().to_string();
        assert!(text.contains("1 entries"));
        assert!(text.contains("1 network attempts"));
    }
}
