//! DestinationResolver - expression evaluation plus delimiter splitting

use tracing::trace;

use contracts::{ExpressionValue, ItineraryExpression, Message, RouteError};

use crate::expression::header_expression;

/// Resolves a message into an ordered itinerary of destination URIs
///
/// Order is preserved exactly as produced; no deduplication, no trimming.
pub struct DestinationResolver {
    expression: ItineraryExpression,
    delimiter: String,
}

impl DestinationResolver {
    /// Create a resolver from an expression and a delimiter
    pub fn new(expression: ItineraryExpression, delimiter: impl Into<String>) -> Self {
        Self {
            expression,
            delimiter: delimiter.into(),
        }
    }

    /// Create a resolver reading the named header, split on `delimiter`
    pub fn from_header(header: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self::new(header_expression(header), delimiter)
    }

    /// Delimiter used to split single-string itineraries
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Evaluate the expression and produce the itinerary
    ///
    /// An expression that yields nothing resolves to an empty itinerary
    /// ("nothing to route"). Empty segments after splitting are discarded;
    /// segments are never trimmed, callers must pre-format.
    ///
    /// # Errors
    /// Returns `Resolution` when the expression evaluation itself fails.
    pub fn resolve(&self, message: &Message) -> Result<Vec<String>, RouteError> {
        let itinerary = match (self.expression)(message)? {
            None => Vec::new(),
            Some(ExpressionValue::Single(value)) => value
                .split(self.delimiter.as_str())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            Some(ExpressionValue::Sequence(uris)) => uris,
        };
        trace!(steps = itinerary.len(), "itinerary resolved");
        Ok(itinerary)
    }
}
