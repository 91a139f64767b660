//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Routing Model
//! - A `Message` carries a mutable header map and a body
//! - An itinerary is an ordered list of destination URIs computed per dispatch
//! - Transports resolve a URI to a `Producer`; the engine never opens channels itself

mod error;
mod expression;
mod message;
mod route_config;
mod transport;

pub use error::*;
pub use expression::{ExpressionValue, ItineraryExpression};
pub use message::*;
pub use route_config::*;
pub use transport::*;
