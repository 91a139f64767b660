//! Built-in itinerary expressions

use std::sync::Arc;

use serde_json::Value;

use contracts::{ExpressionValue, ItineraryExpression, Message, RouteError};

/// Expression reading the itinerary from a named header (the default)
///
/// A string header yields a single delimited value; an array header is
/// already a sequence and bypasses splitting. An absent or null header
/// yields nothing to route. Any other value shape is a resolution error
/// rather than a lossy conversion.
pub fn header_expression(name: impl Into<String>) -> ItineraryExpression {
    let name = name.into();
    Arc::new(move |message: &Message| match message.header(&name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(itinerary)) => Ok(Some(ExpressionValue::Single(itinerary.clone()))),
        Some(Value::Array(items)) => {
            let mut uris = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(uri) => uris.push(uri.clone()),
                    other => {
                        return Err(RouteError::resolution(format!(
                            "header '{name}' contains a non-string entry: {other}"
                        )))
                    }
                }
            }
            Ok(Some(ExpressionValue::Sequence(uris)))
        }
        Some(other) => Err(RouteError::resolution(format!(
            "header '{name}' must be a string or an array of strings, got: {other}"
        ))),
    })
}

/// Expression yielding a fixed itinerary regardless of the message
pub fn constant_expression(itinerary: impl Into<String>) -> ItineraryExpression {
    let itinerary = itinerary.into();
    Arc::new(move |_: &Message| Ok(Some(ExpressionValue::Single(itinerary.clone()))))
}
