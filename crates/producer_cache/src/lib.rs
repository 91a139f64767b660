//! # Producer Cache
//!
//! Bounded pool of reusable outbound producers keyed by destination URI.
//!
//! Responsibilities:
//! - Open producers lazily, one open per URI at a time
//! - Reuse cached producers across dispatches
//! - Evict the least-recently-used entry when the bound is exceeded
//! - Own the channel lifecycle: evicted or shut-down producers are closed

mod cache;
mod metrics;
pub mod mock;

pub use cache::{CacheLimit, PooledProducer, ProducerCache, DEFAULT_CACHE_CAPACITY};
pub use metrics::{CacheMetrics, CacheSnapshot};
