//! Bounded LRU cache of producers with single-flight opens
//!
//! One open attempt per URI proceeds at a time (per-entry `OnceCell`);
//! concurrent acquisitions for the same URI share the result or serialize
//! behind the first opener. Eviction decisions are globally serialized
//! under the state mutex, and every evicted or shut-down producer is
//! closed before it is forgotten.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, trace, warn};

use contracts::{Producer, RouteError, Transport};

use crate::metrics::CacheMetrics;

/// Bound used when the configuration asks for the default cache size
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Capacity semantics derived from the `cache_size` configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLimit {
    /// Keep at most this many cached entries (must be > 0)
    ///
    /// Opens happen outside the state lock, so concurrent misses on
    /// distinct URIs can transiently hold open up to `capacity` plus the
    /// number of in-flight opens; reconciliation closes the excess as
    /// each open completes.
    Bounded(usize),
    /// No caching: every acquire opens a fresh producer, released by the caller
    Disabled,
}

impl CacheLimit {
    /// Map the configured `cache_size`: 0 = default bound, negative = disabled
    pub fn from_config(cache_size: i32) -> Self {
        match cache_size {
            0 => Self::Bounded(DEFAULT_CACHE_CAPACITY),
            size if size < 0 => Self::Disabled,
            size => Self::Bounded(size as usize),
        }
    }

    fn capacity(self) -> Option<usize> {
        match self {
            Self::Bounded(capacity) => Some(capacity),
            Self::Disabled => None,
        }
    }
}

/// Producer checked out of the cache
///
/// Cached producers are shared and stay open after release; transient
/// producers (caching disabled) are owned by the caller and closed by
/// `release`.
pub struct PooledProducer<P> {
    producer: Arc<P>,
    cached: bool,
}

impl<P> std::fmt::Debug for PooledProducer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledProducer")
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

impl<P: Producer + Send + Sync> PooledProducer<P> {
    /// The underlying producer
    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Whether this producer lives in the cache
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Return the producer after use
    pub async fn release(self) -> Result<(), RouteError> {
        if self.cached {
            Ok(())
        } else {
            self.producer.close().await
        }
    }
}

struct CacheEntry<P> {
    cell: Arc<OnceCell<Arc<P>>>,
    last_used: u64,
}

struct CacheState<P> {
    entries: HashMap<String, CacheEntry<P>>,
    tick: u64,
    closed: bool,
}

impl<P> CacheState<P> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tick: 0,
            closed: false,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Remove least-recently-used entries until there is room for one more.
    ///
    /// Returns the producers the caller must close outside the lock.
    fn evict_to_fit(&mut self, capacity: usize) -> Vec<(String, Arc<P>)> {
        let mut closable = Vec::new();
        while self.entries.len() >= capacity {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(uri, _)| uri.clone());
            let Some(uri) = victim else { break };
            if let Some(entry) = self.entries.remove(&uri) {
                if let Some(producer) = entry.cell.get() {
                    closable.push((uri, producer.clone()));
                }
            }
        }
        closable
    }
}

/// Bounded pool of reusable producers keyed by destination URI
pub struct ProducerCache<T: Transport> {
    transport: T,
    limit: CacheLimit,
    state: Mutex<CacheState<T::Producer>>,
    metrics: CacheMetrics,
}

impl<T: Transport> ProducerCache<T> {
    /// Create a cache over the given transport
    pub fn new(transport: T, limit: CacheLimit) -> Self {
        if let CacheLimit::Bounded(capacity) = limit {
            debug_assert!(capacity > 0, "cache capacity must be > 0");
        }
        Self {
            transport,
            limit,
            state: Mutex::new(CacheState::new()),
            metrics: CacheMetrics::new(),
        }
    }

    /// Create a cache with the default bound
    pub fn with_default_capacity(transport: T) -> Self {
        Self::new(transport, CacheLimit::Bounded(DEFAULT_CACHE_CAPACITY))
    }

    /// Configured capacity semantics
    pub fn limit(&self) -> CacheLimit {
        self.limit
    }

    /// Cache counters
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Current number of cached entries
    pub async fn entry_count(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Obtain a producer for the URI, opening one on first use
    ///
    /// # Errors
    /// Returns `InvalidDestination` when the transport cannot resolve the
    /// URI (the failure does not poison the cache; a later acquire
    /// retries), and `CacheShutDown` after `shutdown`.
    #[instrument(name = "producer_cache_acquire", skip_all, fields(uri = %uri))]
    pub async fn acquire(&self, uri: &str) -> Result<PooledProducer<T::Producer>, RouteError> {
        let Some(capacity) = self.limit.capacity() else {
            return self.acquire_transient(uri).await;
        };

        let (cell, closable) = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(RouteError::CacheShutDown);
            }
            let tick = state.next_tick();
            if let Some(entry) = state.entries.get_mut(uri) {
                entry.last_used = tick;
                (entry.cell.clone(), Vec::new())
            } else {
                let closable = state.evict_to_fit(capacity);
                let cell = Arc::new(OnceCell::new());
                state.entries.insert(
                    uri.to_string(),
                    CacheEntry {
                        cell: cell.clone(),
                        last_used: tick,
                    },
                );
                self.metrics.set_entries(state.entries.len());
                (cell, closable)
            }
        };
        self.close_evicted(closable).await;

        let mut opened_here = false;
        let open_result = cell
            .get_or_try_init(|| {
                opened_here = true;
                async {
                    debug!(uri = %uri, "opening producer");
                    self.transport.resolve(uri).await.map(Arc::new)
                }
            })
            .await;

        let producer = match open_result {
            Ok(producer) => producer.clone(),
            Err(error) => {
                self.metrics.inc_open_failures();
                // Leave no vacant slot behind; a later acquire retries.
                let mut state = self.state.lock().await;
                if let Some(entry) = state.entries.get(uri) {
                    if Arc::ptr_eq(&entry.cell, &cell) && !cell.initialized() {
                        state.entries.remove(uri);
                        self.metrics.set_entries(state.entries.len());
                    }
                }
                return Err(error);
            }
        };

        if opened_here {
            self.metrics.inc_misses();
            if let Err(error) = self.register_opened(uri, &cell, capacity).await {
                // Shut down while the open was in flight: the producer
                // must not outlive the cache.
                if let Err(close_error) = producer.close().await {
                    warn!(
                        uri = %uri,
                        error = %close_error,
                        "failed to close producer opened during shutdown"
                    );
                }
                return Err(error);
            }
        } else {
            self.metrics.inc_hits();
        }

        Ok(PooledProducer {
            producer,
            cached: true,
        })
    }

    /// Close every cached producer; subsequent acquires fail fast
    #[instrument(name = "producer_cache_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        let open: Vec<(String, Arc<T::Producer>)> = {
            let mut state = self.state.lock().await;
            if state.closed {
                return;
            }
            state.closed = true;
            state
                .entries
                .drain()
                .filter_map(|(uri, entry)| entry.cell.get().map(|p| (uri, p.clone())))
                .collect()
        };
        info!(producers = open.len(), "shutting down producer cache");
        for (uri, producer) in open {
            if let Err(error) = producer.close().await {
                warn!(uri = %uri, error = %error, "failed to close producer during shutdown");
            }
        }
        self.metrics.set_entries(0);
    }

    async fn acquire_transient(&self, uri: &str) -> Result<PooledProducer<T::Producer>, RouteError> {
        if self.state.lock().await.closed {
            return Err(RouteError::CacheShutDown);
        }
        trace!(uri = %uri, "caching disabled, opening transient producer");
        let producer = match self.transport.resolve(uri).await {
            Ok(producer) => producer,
            Err(error) => {
                self.metrics.inc_open_failures();
                return Err(error);
            }
        };
        self.metrics.inc_misses();
        Ok(PooledProducer {
            producer: Arc::new(producer),
            cached: false,
        })
    }

    /// Re-register a freshly opened producer: the entry may have been
    /// evicted, replaced, or the cache shut down while the transport was
    /// resolving.
    async fn register_opened(
        &self,
        uri: &str,
        cell: &Arc<OnceCell<Arc<T::Producer>>>,
        capacity: usize,
    ) -> Result<(), RouteError> {
        let closable = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(RouteError::CacheShutDown);
            }
            let tick = state.next_tick();
            match state.entries.get_mut(uri) {
                Some(entry) if Arc::ptr_eq(&entry.cell, cell) => {
                    entry.last_used = tick;
                    Vec::new()
                }
                _ => {
                    let mut closable = Vec::new();
                    if let Some(previous) = state.entries.remove(uri) {
                        if let Some(producer) = previous.cell.get() {
                            closable.push((uri.to_string(), producer.clone()));
                        }
                    }
                    closable.extend(state.evict_to_fit(capacity));
                    state.entries.insert(
                        uri.to_string(),
                        CacheEntry {
                            cell: cell.clone(),
                            last_used: tick,
                        },
                    );
                    self.metrics.set_entries(state.entries.len());
                    closable
                }
            }
        };
        self.close_evicted(closable).await;
        Ok(())
    }

    async fn close_evicted(&self, closable: Vec<(String, Arc<T::Producer>)>) {
        for (uri, producer) in closable {
            self.metrics.inc_evictions();
            debug!(uri = %uri, "closing evicted producer");
            if let Err(error) = producer.close().await {
                warn!(uri = %uri, error = %error, "failed to close evicted producer");
            }
        }
    }
}
