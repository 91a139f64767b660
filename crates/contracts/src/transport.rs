//! Transport traits - the boundary to the protocol-adapter layer
//!
//! The engine addresses destinations by URI and consumes two capabilities:
//! resolve a URI to a sendable channel, and send a message through it.
//! It never constructs a channel itself.

use crate::{Message, RouteError};

/// Outbound send-channel to one destination
///
/// All producer implementations must implement this trait.
#[trait_variant::make(Producer: Send)]
pub trait LocalProducer {
    /// Destination URI this producer is bound to (used for logging/metrics)
    fn uri(&self) -> &str;

    /// Send a message, waiting until completion or failure is observed
    ///
    /// # Errors
    /// Returns `DeliveryFailure` when the remote rejects the message or
    /// the transport fails mid-send.
    async fn send(&self, message: &mut Message) -> Result<(), RouteError>;

    /// Close the channel, releasing transport resources
    async fn close(&self) -> Result<(), RouteError>;
}

/// Destination-resolving capability supplied by the transport-adapter layer
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Concrete channel type produced by this transport
    type Producer: Producer + Send + Sync + 'static;

    /// Resolve a destination URI to an open producer
    ///
    /// # Errors
    /// Returns `InvalidDestination` for malformed URIs or unknown schemes.
    async fn resolve(&self, uri: &str) -> Result<Self::Producer, RouteError>;
}
