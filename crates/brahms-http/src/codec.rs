//! Body encoding for the HTTP binding.

use brahms_core::{Node, TransportError};
use thiserror::Error;

use crate::messages::{MsgProbeResp, MsgPullResp};

/// Encoding or decoding of a message body failed.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode: {0}")]
    Encode(String),

    #[error("decode: {0}")]
    Decode(String),
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        TransportError::Encoding(e.to_string())
    }
}

/// Translates wire messages to and from request and response bodies.
///
/// Handler and transport of two talking nodes must agree on the codec.
pub trait Codec: Send + Sync {
    /// Value of the `Content-Type` header for encoded bodies.
    fn content_type(&self) -> &'static str;

    /// Body of a push request: the sender's identity.
    fn encode_node(&self, node: &Node) -> Result<Vec<u8>, CodecError>;
    /// Inverse of [`encode_node`](Self::encode_node). An empty body is an error.
    fn decode_node(&self, body: &[u8]) -> Result<Node, CodecError>;

    /// Body of a pull response: the responder's view.
    fn encode_pull(&self, resp: &MsgPullResp) -> Result<Vec<u8>, CodecError>;
    /// Inverse of [`encode_pull`](Self::encode_pull).
    fn decode_pull(&self, body: &[u8]) -> Result<MsgPullResp, CodecError>;

    /// Body of a probe response.
    fn encode_probe(&self, resp: &MsgProbeResp) -> Result<Vec<u8>, CodecError>;
    /// Inverse of [`encode_probe`](Self::encode_probe).
    fn decode_probe(&self, body: &[u8]) -> Result<MsgProbeResp, CodecError>;
}

/// JSON bodies via serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(body).map_err(|e| CodecError::Decode(e.to_string()))
}

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode_node(&self, node: &Node) -> Result<Vec<u8>, CodecError> {
        encode(node)
    }

    fn decode_node(&self, body: &[u8]) -> Result<Node, CodecError> {
        decode(body)
    }

    fn encode_pull(&self, resp: &MsgPullResp) -> Result<Vec<u8>, CodecError> {
        encode(resp)
    }

    fn decode_pull(&self, body: &[u8]) -> Result<MsgPullResp, CodecError> {
        decode(body)
    }

    fn encode_probe(&self, resp: &MsgProbeResp) -> Result<Vec<u8>, CodecError> {
        encode(resp)
    }

    fn decode_probe(&self, body: &[u8]) -> Result<MsgProbeResp, CodecError> {
        decode(body)
    }
}
