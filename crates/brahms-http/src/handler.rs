//! Inbound side: answers push, pull and probe requests from peers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use brahms_core::Responder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::codec::{Codec, CodecError};
use crate::messages::{MsgProbeResp, MsgPullResp};

/// Peers announce themselves here; the body is one encoded [`Node`](brahms_core::Node).
pub const PUSH_PATH: &str = "/push";
/// Answers with the current view as a [`MsgPullResp`].
pub const PULL_PATH: &str = "/pull";
/// Liveness check, answered with a [`MsgProbeResp`].
pub const PROBE_PATH: &str = "/probe";

#[derive(Clone)]
struct HandlerState {
    core: Arc<dyn Responder>,
    codec: Arc<dyn Codec>,
}

/// Build the router serving `core` to its peers.
///
/// Only `POST` on the three protocol paths is routed; everything else,
/// including other methods on those paths, answers 404.
pub fn router(core: Arc<dyn Responder>, codec: Arc<dyn Codec>) -> Router {
    Router::new()
        .route(PUSH_PATH, post(push).fallback(not_found))
        .route(PULL_PATH, post(pull).fallback(not_found))
        .route(PROBE_PATH, post(probe).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(HandlerState { core, codec })
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn push(State(state): State<HandlerState>, body: Bytes) -> StatusCode {
    match state.codec.decode_node(&body) {
        Ok(node) => {
            state.core.receive_node(node);
            StatusCode::OK
        }
        Err(e) => {
            debug!(error = %e, "rejected push");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn pull(State(state): State<HandlerState>) -> Response {
    let resp: MsgPullResp = state.core.read_view().into_nodes();
    encoded(state.codec.as_ref(), state.codec.encode_pull(&resp))
}

async fn probe(State(state): State<HandlerState>) -> Response {
    let resp = MsgProbeResp {
        active: state.core.is_active(),
    };
    encoded(state.codec.as_ref(), state.codec.encode_probe(&resp))
}

fn encoded(codec: &dyn Codec, body: Result<Vec<u8>, CodecError>) -> Response {
    match body {
        Ok(body) => ([(header::CONTENT_TYPE, codec.content_type())], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
