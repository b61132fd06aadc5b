//! Outbound side: a [`Transport`] that talks to peers over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brahms_core::transport::Result;
use brahms_core::{Nid, Node, Transport, TransportError, View};
use reqwest::header;
use tokio::sync::mpsc;
use tracing::trace;

use crate::codec::{Codec, JsonCodec};
use crate::handler::{PROBE_PATH, PULL_PATH, PUSH_PATH};

/// Default timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Default cap on a response body. A full view of a few thousand nodes fits.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1 << 20;

/// HTTP client side of the binding.
///
/// Every call is a single `POST` to `http://{peer}/{push,pull,probe}`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    codec: Arc<dyn Codec>,
    max_response_bytes: usize,
}

impl HttpTransport {
    /// Create a transport using [`JsonCodec`] and the given per-request timeout.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self {
            client,
            codec: Arc::new(JsonCodec),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    /// Use a different body codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Refuse response bodies larger than `limit` bytes.
    ///
    /// An oversized body fails the call with [`TransportError::Encoding`].
    #[must_use]
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    async fn post(&self, to: &Node, path: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let url = format!("http://{}{}", to.addr(), path);
        trace!(%url, "post");

        let mut resp = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, self.codec.content_type())
            .body(body)
            .send()
            .await
            .map_err(|e| request_error(to, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                peer: to.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.max_response_bytes;
        if resp.content_length().is_some_and(|len| len > limit as u64) {
            return Err(too_large(to, limit));
        }

        // Content-Length may be absent or wrong, so the cap holds per chunk too.
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| request_error(to, e))? {
            if body.len() + chunk.len() > limit {
                return Err(too_large(to, limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("content_type", &self.codec.content_type())
            .field("max_response_bytes", &self.max_response_bytes)
            .finish_non_exhaustive()
    }
}

fn too_large(to: &Node, limit: usize) -> TransportError {
    TransportError::Encoding(format!("{to}: response body exceeds {limit} bytes"))
}

fn request_error(to: &Node, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(to.to_string())
    } else if e.is_connect() {
        TransportError::Unreachable(to.to_string())
    } else {
        TransportError::Other(format!("{to}: {e}"))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn emit(&self, acks: &mpsc::Sender<Nid>, id: Nid, msg: &[u8], to: &Node) -> Result<()> {
        self.post(to, PUSH_PATH, msg.to_vec()).await?;
        let _ = acks.try_send(id);
        Ok(())
    }

    async fn push(&self, me: &Node, to: &Node) -> Result<()> {
        let body = self.codec.encode_node(me)?;
        self.post(to, PUSH_PATH, body).await?;
        Ok(())
    }

    async fn pull(&self, from: &Node) -> Result<View> {
        let body = self.post(from, PULL_PATH, Vec::new()).await?;
        Ok(View::from(self.codec.decode_pull(&body)?))
    }

    async fn probe(&self, to: &Node) -> Result<bool> {
        let body = self.post(to, PROBE_PATH, Vec::new()).await?;
        Ok(self.codec.decode_probe(&body)?.active)
    }
}
