//! What the engine needs from the network, and what a network binding
//! needs from the engine.
//!
//! Implementations:
//! - [`MemNetTransport`](crate::MemNetTransport): in-process network for simulation and tests
//! - `brahms_http::HttpTransport`: JSON over HTTP

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::{Nid, Node, View};

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Network capability the round function and the validation pass rely on.
///
/// Calls are best effort. Callers bound them with their own time budget and
/// treat an error exactly like a missing answer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver an encoded push message to `to`.
    ///
    /// Once `to` accepted the message, `id` is written to `acks` without
    /// blocking; a full or closed ack channel is ignored.
    async fn emit(&self, acks: &mpsc::Sender<Nid>, id: Nid, msg: &[u8], to: &Node) -> Result<()>;

    /// Advertise `me` to `to`.
    async fn push(&self, me: &Node, to: &Node) -> Result<()>;

    /// Fetch the current view of `from`.
    async fn pull(&self, from: &Node) -> Result<View>;

    /// Ask `to` whether it is active.
    async fn probe(&self, to: &Node) -> Result<bool>;
}

/// The side of a node that answers its peers.
///
/// Bindings call these from request handlers, concurrently with rounds.
pub trait Responder: Send + Sync {
    /// Whether the node takes part in the protocol.
    fn is_active(&self) -> bool;

    /// Sink for a push received from a peer.
    fn receive_node(&self, node: Node);

    /// Snapshot of the current view, for answering pulls.
    fn read_view(&self) -> View;
}

/// Encode a push message body for [`Transport::emit`].
pub fn encode_push(node: &Node) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(node)?)
}

/// Decode a push message body produced by [`encode_push`].
pub fn decode_push(msg: &[u8]) -> Result<Node> {
    Ok(serde_json::from_slice(msg)?)
}
