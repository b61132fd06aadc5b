//! HTTP binding for Brahms.
//!
//! - [`router`]: axum routes answering `POST /push`, `/pull` and `/probe`
//!   on behalf of a [`Responder`](brahms_core::Responder)
//! - [`HttpTransport`]: the matching client, a [`Transport`](brahms_core::Transport)
//!   built on reqwest
//!
//! Bodies go through a [`Codec`]; [`JsonCodec`] is the default on both sides.

mod codec;
mod handler;
mod messages;
mod transport;

pub use codec::{Codec, CodecError, JsonCodec};
pub use handler::{router, PROBE_PATH, PULL_PATH, PUSH_PATH};
pub use messages::{MsgProbeResp, MsgPullResp};
pub use transport::{HttpTransport, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_REQUEST_TIMEOUT};
