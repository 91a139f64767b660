//! Layered error definitions
//!
//! Categorized by source: config / resolution / destination / delivery / lifecycle

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum RouteError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Resolution Errors =====
    /// Itinerary expression evaluation failed; the itinerary cannot be trusted
    #[error("itinerary resolution error: {message}")]
    Resolution { message: String },

    // ===== Destination Errors =====
    /// The identifier could not be resolved to a sendable channel
    #[error("invalid destination '{uri}': {message}")]
    InvalidDestination { uri: String, message: String },

    // ===== Delivery Errors =====
    /// The channel was obtained but the send itself failed
    #[error("delivery to '{uri}' failed: {message}")]
    DeliveryFailure { uri: String, message: String },

    /// The step deadline elapsed before the send completed
    #[error("step deadline exceeded for '{uri}' after {elapsed_ms}ms")]
    StepTimeout { uri: String, elapsed_ms: u64 },

    // ===== Lifecycle Errors =====
    /// The caller cancelled the dispatch
    #[error("dispatch cancelled at '{uri}'")]
    Cancelled { uri: String },

    /// The producer cache has been shut down
    #[error("producer cache is shut down")]
    CacheShutDown,

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Per-step failure classification
///
/// Only `InvalidDestination` is policy-skippable; delivery-time failures
/// (including step timeouts) always fail the dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Resolution/open-time problem with a single destination
    InvalidDestination,
    /// Send-time failure, always fatal to the current dispatch
    Delivery,
    /// Caller-initiated cancellation
    Cancelled,
    /// The itinerary expression itself failed
    Resolution,
    /// Engine torn down
    ShutDown,
    /// Configuration problem, surfaced at construction time
    Config,
    /// Uncategorized
    Other,
}

impl FailureKind {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidDestination => "invalid_destination",
            Self::Delivery => "delivery",
            Self::Cancelled => "cancelled",
            Self::Resolution => "resolution",
            Self::ShutDown => "shutdown",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl RouteError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create itinerary resolution error
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    /// Create invalid destination error
    pub fn invalid_destination(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDestination {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Create delivery failure error
    pub fn delivery_failure(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeliveryFailure {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Classify this error for the skip-vs-abort decision
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } => FailureKind::Config,
            Self::Resolution { .. } => FailureKind::Resolution,
            Self::InvalidDestination { .. } => FailureKind::InvalidDestination,
            Self::DeliveryFailure { .. } | Self::StepTimeout { .. } => FailureKind::Delivery,
            Self::Cancelled { .. } => FailureKind::Cancelled,
            Self::CacheShutDown => FailureKind::ShutDown,
            Self::Io(_) | Self::Other(_) => FailureKind::Other,
        }
    }

    /// Whether the current step may be skipped under the given policy
    ///
    /// `ignore_invalid_endpoints` only governs resolution-time problems,
    /// never delivery-time ones.
    pub fn is_skippable(&self, ignore_invalid_endpoints: bool) -> bool {
        ignore_invalid_endpoints && self.kind() == FailureKind::InvalidDestination
    }
}
