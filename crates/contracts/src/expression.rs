//! Itinerary expression capability
//!
//! An expression evaluates a message into the raw material of an itinerary.
//! Concrete expression kinds (header lookup, constant, computed) are plain
//! closures behind one function type, no inheritance.

use std::sync::Arc;

use crate::{Message, RouteError};

/// Raw expression result, before delimiter splitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionValue {
    /// A single delimited string; the resolver splits it
    Single(String),
    /// An already-ordered sequence of destination URIs; used as-is
    Sequence(Vec<String>),
}

/// Itinerary expression type
///
/// `Ok(None)` means the expression yielded nothing (absent header):
/// the itinerary is empty and the message passes through unchanged.
/// `Err` means the evaluation itself failed and the itinerary cannot
/// be trusted.
pub type ItineraryExpression =
    Arc<dyn Fn(&Message) -> Result<Option<ExpressionValue>, RouteError> + Send + Sync>;
