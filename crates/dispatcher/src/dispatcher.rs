//! Routing-slip dispatcher - walks one message through its itinerary
//!
//! Per dispatch the machine cycles Resolving -> Sending -> Deciding until
//! the itinerary is exhausted (success) or a fatal failure is classified.
//! Dispatches are independent sequential walks; the producer cache is the
//! only shared state between them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use contracts::{
    ItineraryExpression, Message, Producer, ResolutionMode, RouteConfig, RouteError, Transport,
};
use producer_cache::{CacheLimit, CacheMetrics, PooledProducer, ProducerCache};
use resolver::{header_expression, DestinationResolver};

use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;

/// Builder for creating a RoutingSlip engine
pub struct RoutingSlipBuilder<T: Transport> {
    config: RouteConfig,
    transport: T,
    expression: Option<ItineraryExpression>,
}

impl<T: Transport> RoutingSlipBuilder<T> {
    /// Create a new RoutingSlipBuilder
    pub fn new(config: RouteConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            expression: None,
        }
    }

    /// Replace the default header-lookup expression
    pub fn expression(mut self, expression: ItineraryExpression) -> Self {
        self.expression = Some(expression);
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> Result<RoutingSlip<T>, RouteError> {
        let config = self.config.validated()?;
        let expression = self
            .expression
            .unwrap_or_else(|| header_expression(config.header.clone()));
        let resolver = DestinationResolver::new(expression, config.delimiter.clone());
        let cache = Arc::new(ProducerCache::new(
            self.transport,
            CacheLimit::from_config(config.cache_size),
        ));

        info!(
            header = %config.header,
            delimiter = %config.delimiter,
            ignore_invalid_endpoints = config.ignore_invalid_endpoints,
            cache_size = config.cache_size,
            resolution = ?config.resolution,
            "routing slip engine built"
        );

        Ok(RoutingSlip {
            resolver,
            cache,
            ignore_invalid_endpoints: config.ignore_invalid_endpoints,
            mode: config.resolution,
            step_timeout: config.step_timeout_ms.map(Duration::from_millis),
            metrics: Arc::new(DispatchMetrics::new()),
        })
    }
}

/// Result of a dispatch that walked its full itinerary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Steps sent successfully, in itinerary order
    pub steps_sent: usize,
    /// Destinations skipped under the invalid-endpoint policy
    pub skipped: Vec<String>,
}

/// The routing-slip engine
///
/// Cheap to share behind an `Arc`; every `dispatch` call is an
/// independent sequential itinerary walk.
pub struct RoutingSlip<T: Transport> {
    resolver: DestinationResolver,
    cache: Arc<ProducerCache<T>>,
    ignore_invalid_endpoints: bool,
    mode: ResolutionMode,
    step_timeout: Option<Duration>,
    metrics: Arc<DispatchMetrics>,
}

impl<T: Transport> std::fmt::Debug for RoutingSlip<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingSlip")
            .field("ignore_invalid_endpoints", &self.ignore_invalid_endpoints)
            .field("mode", &self.mode)
            .field("step_timeout", &self.step_timeout)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> RoutingSlip<T> {
    /// Dispatch metrics
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Producer cache metrics
    pub fn cache_metrics(&self) -> &CacheMetrics {
        self.cache.metrics()
    }

    /// Tear down the engine, closing every cached producer
    pub async fn shutdown(&self) {
        self.cache.shutdown().await;
    }

    /// Route the message through its itinerary
    pub async fn dispatch(&self, message: &mut Message) -> Result<DispatchReport, DispatchError> {
        self.dispatch_with_cancellation(message, &CancellationToken::new())
            .await
    }

    /// Route the message, aborting early when `cancel` fires
    ///
    /// Step n+1 never begins before step n's completion or skip decision
    /// is observed.
    #[instrument(name = "routing_slip_dispatch", skip_all)]
    pub async fn dispatch_with_cancellation(
        &self,
        message: &mut Message,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, DispatchError> {
        self.metrics.inc_dispatches();
        let mut report = DispatchReport::default();
        let mut cursor = 0usize;
        let mut static_itinerary: Option<Vec<String>> = None;

        loop {
            // Resolving: full itinerary once, or re-evaluated per step
            let next = match self.next_destination(message, cursor, &mut static_itinerary) {
                Ok(next) => next,
                Err(error) => {
                    self.metrics.inc_failed();
                    return Err(DispatchError::resolution(report.steps_sent, error));
                }
            };
            let Some(uri) = next else {
                break; // itinerary exhausted
            };

            if cancel.is_cancelled() {
                self.metrics.inc_failed();
                return Err(DispatchError::at(
                    uri.clone(),
                    report.steps_sent,
                    RouteError::Cancelled { uri },
                ));
            }

            // Sending
            let step = self.send_step(&uri, message, cancel).await;

            // Deciding
            match step {
                Ok(()) => {
                    self.metrics.inc_steps_sent();
                    report.steps_sent += 1;
                    cursor += 1;
                }
                Err(error) if error.is_skippable(self.ignore_invalid_endpoints) => {
                    warn!(uri = %uri, error = %error, "skipping invalid destination");
                    self.metrics.inc_steps_skipped();
                    report.skipped.push(uri);
                    cursor += 1;
                }
                Err(error) => {
                    self.metrics.inc_failed();
                    return Err(DispatchError::at(uri, report.steps_sent, error));
                }
            }
        }

        self.metrics.inc_succeeded();
        debug!(
            steps_sent = report.steps_sent,
            skipped = report.skipped.len(),
            "itinerary walk complete"
        );
        Ok(report)
    }

    fn next_destination(
        &self,
        message: &Message,
        cursor: usize,
        static_itinerary: &mut Option<Vec<String>>,
    ) -> Result<Option<String>, RouteError> {
        match self.mode {
            ResolutionMode::Static => {
                if static_itinerary.is_none() {
                    *static_itinerary = Some(self.resolver.resolve(message)?);
                }
                Ok(static_itinerary
                    .as_ref()
                    .and_then(|itinerary| itinerary.get(cursor).cloned()))
            }
            ResolutionMode::Dynamic => {
                // Earlier steps may have mutated the state the expression
                // reads; a shrunk itinerary ends the walk.
                let itinerary = self.resolver.resolve(message)?;
                Ok(itinerary.get(cursor).cloned())
            }
        }
    }

    async fn send_step(
        &self,
        uri: &str,
        message: &mut Message,
        cancel: &CancellationToken,
    ) -> Result<(), RouteError> {
        let pooled = self.cache.acquire(uri).await?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RouteError::Cancelled { uri: uri.to_string() }),
            result = self.send_with_deadline(uri, &pooled, message) => result,
        };

        // A failed send returns the producer to the cache unchanged; only
        // transient producers are closed here.
        if let Err(error) = pooled.release().await {
            warn!(uri = %uri, error = %error, "failed to close transient producer");
        }
        result
    }

    async fn send_with_deadline(
        &self,
        uri: &str,
        pooled: &PooledProducer<T::Producer>,
        message: &mut Message,
    ) -> Result<(), RouteError> {
        match self.step_timeout {
            Some(deadline) => {
                let started = Instant::now();
                match timeout(deadline, pooled.producer().send(message)).await {
                    Ok(result) => result,
                    Err(_) => Err(RouteError::StepTimeout {
                        uri: uri.to_string(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    }),
                }
            }
            None => pooled.producer().send(message).await,
        }
    }
}

/// Convenience function to create an engine from configuration
pub fn create_routing_slip<T: Transport>(
    config: RouteConfig,
    transport: T,
) -> Result<RoutingSlip<T>, RouteError> {
    RoutingSlipBuilder::new(config, transport).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FailureKind;
    use producer_cache::mock::{MockTransport, MockTransportConfig, SendHook};
    use resolver::constant_expression;
    use tokio::time::sleep;

    fn slip_message(itinerary: &str) -> Message {
        let mut message = Message::new();
        message.set_header("routing_slip", itinerary);
        message
    }

    fn engine(config: RouteConfig, transport: &MockTransport) -> RoutingSlip<MockTransport> {
        create_routing_slip(config, transport.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_full_walk_in_order() {
        let transport = MockTransport::new();
        let slip = engine(RouteConfig::default(), &transport);

        let mut message = slip_message("mock:a,mock:b,mock:c");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(transport.sends(), vec!["mock:a", "mock:b", "mock:c"]);
        assert_eq!(slip.metrics().succeeded(), 1);
    }

    #[tokio::test]
    async fn test_invalid_destination_skipped_under_policy() {
        let transport = MockTransport::new();
        let config = RouteConfig {
            ignore_invalid_endpoints: true,
            ..RouteConfig::default()
        };
        let slip = engine(config, &transport);

        let mut message = slip_message("bogus:x,mock:y");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 1);
        assert_eq!(report.skipped, vec!["bogus:x"]);
        assert_eq!(transport.sends(), vec!["mock:y"]);
    }

    #[tokio::test]
    async fn test_invalid_destination_fatal_by_default() {
        let transport = MockTransport::new();
        let slip = engine(RouteConfig::default(), &transport);

        let mut message = slip_message("bogus:x,mock:y");
        let err = slip.dispatch(&mut message).await.unwrap_err();

        assert_eq!(err.uri.as_deref(), Some("bogus:x"));
        assert_eq!(err.steps_sent, 0);
        assert_eq!(err.source.kind(), FailureKind::InvalidDestination);
        assert!(transport.sends().is_empty());
        assert_eq!(slip.metrics().failed(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_fatal_even_when_ignoring_invalid() {
        let transport = MockTransport::with_config(MockTransportConfig {
            fail_send: vec!["mock:b".into()],
            ..MockTransportConfig::default()
        });
        let config = RouteConfig {
            ignore_invalid_endpoints: true,
            ..RouteConfig::default()
        };
        let slip = engine(config, &transport);

        let mut message = slip_message("mock:a,mock:b,mock:c");
        let err = slip.dispatch(&mut message).await.unwrap_err();

        assert_eq!(err.uri.as_deref(), Some("mock:b"));
        assert_eq!(err.steps_sent, 1);
        assert_eq!(err.source.kind(), FailureKind::Delivery);
        // mock:c is never attempted
        assert_eq!(transport.sends(), vec!["mock:a"]);
    }

    #[tokio::test]
    async fn test_empty_itinerary_passes_through() {
        let transport = MockTransport::new();
        let slip = engine(RouteConfig::default(), &transport);

        // Absent header
        let report = slip.dispatch(&mut Message::new()).await.unwrap();
        assert_eq!(report.steps_sent, 0);

        // Header splits to nothing
        let report = slip.dispatch(&mut slip_message(",,")).await.unwrap();
        assert_eq!(report.steps_sent, 0);
        assert!(transport.sends().is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_duplicates_are_two_steps() {
        let transport = MockTransport::new();
        let slip = engine(RouteConfig::default(), &transport);

        let mut message = slip_message("mock:a,mock:a");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 2);
        assert_eq!(transport.sends(), vec!["mock:a", "mock:a"]);
        // Same identifier maps to the same cached producer
        assert_eq!(transport.open_count("mock:a"), 1);
    }

    fn rewrite_hook(trigger: &'static str, new_itinerary: &'static str) -> SendHook {
        Arc::new(move |uri: &str, message: &mut Message| {
            if uri == trigger {
                message.set_header("routing_slip", new_itinerary);
            }
        })
    }

    #[tokio::test]
    async fn test_dynamic_mode_re_resolves_between_steps() {
        let transport = MockTransport::with_config(MockTransportConfig {
            send_hook: Some(rewrite_hook("mock:a", "mock:a,mock:c")),
            ..MockTransportConfig::default()
        });
        let config = RouteConfig {
            resolution: ResolutionMode::Dynamic,
            ..RouteConfig::default()
        };
        let slip = engine(config, &transport);

        let mut message = slip_message("mock:a,mock:b");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 2);
        assert_eq!(transport.sends(), vec!["mock:a", "mock:c"]);
    }

    #[tokio::test]
    async fn test_static_mode_ignores_mutation() {
        let transport = MockTransport::with_config(MockTransportConfig {
            send_hook: Some(rewrite_hook("mock:a", "mock:a,mock:c")),
            ..MockTransportConfig::default()
        });
        let slip = engine(RouteConfig::default(), &transport);

        let mut message = slip_message("mock:a,mock:b");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 2);
        assert_eq!(transport.sends(), vec!["mock:a", "mock:b"]);
    }

    #[tokio::test]
    async fn test_dynamic_mode_shrunk_itinerary_ends_walk() {
        let transport = MockTransport::with_config(MockTransportConfig {
            send_hook: Some(rewrite_hook("mock:a", "mock:a")),
            ..MockTransportConfig::default()
        });
        let config = RouteConfig {
            resolution: ResolutionMode::Dynamic,
            ..RouteConfig::default()
        };
        let slip = engine(config, &transport);

        let mut message = slip_message("mock:a,mock:b,mock:c");
        let report = slip.dispatch(&mut message).await.unwrap();

        assert_eq!(report.steps_sent, 1);
        assert_eq!(transport.sends(), vec!["mock:a"]);
    }

    #[tokio::test]
    async fn test_step_timeout_is_delivery_failure() {
        let transport = MockTransport::with_config(MockTransportConfig {
            send_delay: Some(Duration::from_millis(200)),
            ..MockTransportConfig::default()
        });
        let config = RouteConfig {
            step_timeout_ms: Some(20),
            ..RouteConfig::default()
        };
        let slip = engine(config, &transport);

        let mut message = slip_message("mock:a");
        let err = slip.dispatch(&mut message).await.unwrap_err();

        assert!(matches!(err.source, RouteError::StepTimeout { .. }));
        assert_eq!(err.source.kind(), FailureKind::Delivery);
        assert_eq!(err.uri.as_deref(), Some("mock:a"));
    }

    #[tokio::test]
    async fn test_pre_cancelled_dispatch_fails_before_sending() {
        let transport = MockTransport::new();
        let slip = engine(RouteConfig::default(), &transport);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut message = slip_message("mock:a,mock:b");
        let err = slip
            .dispatch_with_cancellation(&mut message, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.source.kind(), FailureKind::Cancelled);
        assert_eq!(err.uri.as_deref(), Some("mock:a"));
        assert!(transport.sends().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_mid_send() {
        let transport = MockTransport::with_config(MockTransportConfig {
            send_delay: Some(Duration::from_millis(200)),
            ..MockTransportConfig::default()
        });
        let slip = engine(RouteConfig::default(), &transport);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let mut message = slip_message("mock:a,mock:b");
        let err = slip
            .dispatch_with_cancellation(&mut message, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.source.kind(), FailureKind::Cancelled);
        assert_eq!(err.uri.as_deref(), Some("mock:a"));
        assert!(transport.sends().is_empty());
        // Cancellation does not evict the cached producer
        assert_eq!(transport.currently_open(), 1);
    }

    #[tokio::test]
    async fn test_resolution_error_is_fatal() {
        let transport = MockTransport::new();
        let slip = engine(RouteConfig::default(), &transport);

        let mut message = Message::new();
        message.set_header("routing_slip", 42);
        let err = slip.dispatch(&mut message).await.unwrap_err();

        assert_eq!(err.source.kind(), FailureKind::Resolution);
        assert_eq!(err.uri, None);
        assert!(transport.sends().is_empty());
    }

    #[tokio::test]
    async fn test_custom_expression() {
        let transport = MockTransport::new();
        let slip = RoutingSlipBuilder::new(RouteConfig::default(), transport.clone())
            .expression(constant_expression("mock:a,mock:b"))
            .build()
            .unwrap();

        let report = slip.dispatch(&mut Message::new()).await.unwrap();
        assert_eq!(report.steps_sent, 2);
        assert_eq!(transport.sends(), vec!["mock:a", "mock:b"]);
    }

    #[tokio::test]
    async fn test_engine_debug_omits_transport() {
        let slip = engine(RouteConfig::default(), &MockTransport::new());
        let rendered = format!("{slip:?}");
        assert!(rendered.contains("ignore_invalid_endpoints: false"));
        assert!(rendered.contains("mode: Static"));
    }

    #[tokio::test]
    async fn test_builder_rejects_invalid_config() {
        let config = RouteConfig {
            delimiter: String::new(),
            ..RouteConfig::default()
        };
        let err = create_routing_slip(config, MockTransport::new()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
    }

    #[tokio::test]
    async fn test_shutdown_fails_subsequent_dispatches() {
        let transport = MockTransport::new();
        let slip = engine(RouteConfig::default(), &transport);

        slip.dispatch(&mut slip_message("mock:a")).await.unwrap();
        slip.shutdown().await;
        assert_eq!(transport.currently_open(), 0);

        let err = slip.dispatch(&mut slip_message("mock:a")).await.unwrap_err();
        assert_eq!(err.source.kind(), FailureKind::ShutDown);
    }
}
