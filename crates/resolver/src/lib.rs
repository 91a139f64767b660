//! # Resolver
//!
//! Destination resolution module.
//!
//! Responsibilities:
//! - Evaluate an itinerary expression against a `Message`
//! - Split a single delimited string into an ordered destination list
//! - Pass through expressions that already yield a sequence

mod expression;
mod resolver;

pub use contracts::{ExpressionValue, ItineraryExpression};
pub use expression::{constant_expression, header_expression};
pub use resolver::DestinationResolver;
