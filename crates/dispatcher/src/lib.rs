//! # Dispatcher
//!
//! Routing-slip dispatch module.
//!
//! Responsibilities:
//! - Walk a message through its resolved itinerary, one step at a time
//! - Acquire producers from the cache per step
//! - Classify per-step failures: skip invalid destinations or halt

pub mod dispatcher;
pub mod error;
pub mod metrics;

pub use contracts::{Message, ResolutionMode, RouteConfig, RouteError, Transport};
pub use dispatcher::{create_routing_slip, DispatchReport, RoutingSlip, RoutingSlipBuilder};
pub use error::DispatchError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
