//! Mock transport
//!
//! Test double for the transport seam, with injectable failure scenarios.
//! URIs with the `bogus:` scheme always fail resolution.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::{Message, Producer, RouteError, Transport};

/// Hook invoked on every successful send, before it is recorded
///
/// Lets tests mutate the message (e.g. rewrite the routing header) the
/// way a real endpoint would.
pub type SendHook = Arc<dyn Fn(&str, &mut Message) + Send + Sync>;

/// Mock transport configuration
#[derive(Default, Clone)]
pub struct MockTransportConfig {
    /// URIs that always fail resolution
    pub fail_resolve: Vec<String>,
    /// URIs that fail resolution exactly once, then succeed
    pub fail_resolve_once: Vec<String>,
    /// URIs whose sends fail
    pub fail_send: Vec<String>,
    /// Artificial open latency
    pub resolve_delay: Option<Duration>,
    /// Artificial send latency
    pub send_delay: Option<Duration>,
    /// Message mutation hook applied on successful sends
    pub send_hook: Option<SendHook>,
}

#[derive(Default)]
struct MockState {
    /// URIs in successful send order
    sends: Vec<String>,
    /// URIs in close order
    closes: Vec<String>,
    /// Open count per URI
    opens: HashMap<String, usize>,
    /// One-shot resolution failures still pending
    fail_once: HashSet<String>,
}

/// Mock transport recording opens, sends and closes
#[derive(Clone)]
pub struct MockTransport {
    config: MockTransportConfig,
    state: Arc<Mutex<MockState>>,
    open_now: Arc<AtomicUsize>,
    open_peak: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Create a mock transport where everything succeeds
    pub fn new() -> Self {
        Self::with_config(MockTransportConfig::default())
    }

    /// Create a mock transport with injected failure scenarios
    pub fn with_config(config: MockTransportConfig) -> Self {
        let fail_once = config.fail_resolve_once.iter().cloned().collect();
        Self {
            config,
            state: Arc::new(Mutex::new(MockState {
                fail_once,
                ..MockState::default()
            })),
            open_now: Arc::new(AtomicUsize::new(0)),
            open_peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// URIs in successful send order
    pub fn sends(&self) -> Vec<String> {
        self.state.lock().unwrap().sends.clone()
    }

    /// URIs in close order
    pub fn closes(&self) -> Vec<String> {
        self.state.lock().unwrap().closes.clone()
    }

    /// How many times the URI was opened
    pub fn open_count(&self, uri: &str) -> usize {
        self.state.lock().unwrap().opens.get(uri).copied().unwrap_or(0)
    }

    /// Total opens across all URIs
    pub fn total_opens(&self) -> usize {
        self.state.lock().unwrap().opens.values().sum()
    }

    /// Producers currently open
    pub fn currently_open(&self) -> usize {
        self.open_now.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open producers observed
    pub fn peak_open(&self) -> usize {
        self.open_peak.load(Ordering::SeqCst)
    }

    fn should_fail_resolve(&self, uri: &str) -> bool {
        if uri.starts_with("bogus:") || self.config.fail_resolve.iter().any(|u| u == uri) {
            return true;
        }
        self.state.lock().unwrap().fail_once.remove(uri)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    type Producer = MockProducer;

    async fn resolve(&self, uri: &str) -> Result<MockProducer, RouteError> {
        if let Some(delay) = self.config.resolve_delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail_resolve(uri) {
            return Err(RouteError::invalid_destination(
                uri,
                "no transport adapter for scheme",
            ));
        }

        {
            let mut state = self.state.lock().unwrap();
            *state.opens.entry(uri.to_string()).or_insert(0) += 1;
        }
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.open_peak.fetch_max(now, Ordering::SeqCst);

        Ok(MockProducer {
            uri: uri.to_string(),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            open_now: Arc::clone(&self.open_now),
            closed: AtomicBool::new(false),
        })
    }
}

/// Producer handed out by `MockTransport`
pub struct MockProducer {
    uri: String,
    config: MockTransportConfig,
    state: Arc<Mutex<MockState>>,
    open_now: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl MockProducer {
    /// Whether this producer has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Producer for MockProducer {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn send(&self, message: &mut Message) -> Result<(), RouteError> {
        if self.is_closed() {
            return Err(RouteError::delivery_failure(&self.uri, "producer is closed"));
        }
        if let Some(delay) = self.config.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.config.fail_send.iter().any(|u| u == &self.uri) {
            return Err(RouteError::delivery_failure(
                &self.uri,
                "remote rejected the message",
            ));
        }
        if let Some(hook) = &self.config.send_hook {
            hook(&self.uri, message);
        }
        self.state.lock().unwrap().sends.push(self.uri.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), RouteError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open_now.fetch_sub(1, Ordering::SeqCst);
            self.state.lock().unwrap().closes.push(self.uri.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_and_send_recording() {
        let transport = MockTransport::new();
        let producer = transport.resolve("mock:a").await.unwrap();
        assert_eq!(producer.uri(), "mock:a");
        assert_eq!(transport.currently_open(), 1);

        let mut message = Message::new();
        producer.send(&mut message).await.unwrap();
        assert_eq!(transport.sends(), vec!["mock:a"]);

        producer.close().await.unwrap();
        producer.close().await.unwrap(); // idempotent
        assert_eq!(transport.currently_open(), 0);
        assert_eq!(transport.closes(), vec!["mock:a"]);
    }

    #[tokio::test]
    async fn test_bogus_scheme_fails_resolution() {
        let transport = MockTransport::new();
        assert!(transport.resolve("bogus:x").await.is_err());
        assert_eq!(transport.total_opens(), 0);
    }

    #[tokio::test]
    async fn test_send_to_closed_producer_fails() {
        let transport = MockTransport::new();
        let producer = transport.resolve("mock:a").await.unwrap();
        producer.close().await.unwrap();
        let err = producer.send(&mut Message::new()).await.unwrap_err();
        assert!(matches!(err, RouteError::DeliveryFailure { .. }));
    }
}
