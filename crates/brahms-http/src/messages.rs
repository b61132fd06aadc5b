//! Wire messages exchanged between nodes.
//!
//! A push request body is a bare [`Node`](brahms_core::Node).

use brahms_core::Node;
use serde::{Deserialize, Serialize};

/// Pull response: the responder's view as a node list.
pub type MsgPullResp = Vec<Node>;

/// Probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgProbeResp {
    pub active: bool,
}
