//! Dispatcher error types

use thiserror::Error;

use contracts::RouteError;

/// Terminal failure of one dispatch
///
/// Carries the identifier of the failing step when one was reached;
/// `uri` is `None` when itinerary resolution itself failed.
#[derive(Debug, Error)]
#[error("dispatch failed after {steps_sent} completed steps: {source}")]
pub struct DispatchError {
    /// Identifier of the step that failed, if a step was reached
    pub uri: Option<String>,
    /// Steps successfully sent before the failure
    pub steps_sent: usize,
    /// The classified error that stopped the dispatch
    #[source]
    pub source: RouteError,
}

impl DispatchError {
    /// Failure at a concrete itinerary step
    pub fn at(uri: impl Into<String>, steps_sent: usize, source: RouteError) -> Self {
        Self {
            uri: Some(uri.into()),
            steps_sent,
            source,
        }
    }

    /// Failure before any step could be identified
    pub fn resolution(steps_sent: usize, source: RouteError) -> Self {
        Self {
            uri: None,
            steps_sent,
            source,
        }
    }
}
