//! Handler and transport against a real loopback listener.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use brahms_core::{Node, Responder, Transport, TransportError, View};
use brahms_http::{router, Codec, CodecError, HttpTransport, JsonCodec, MsgProbeResp, MsgPullResp};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

struct MockCore {
    active: AtomicBool,
    received: Mutex<Vec<Node>>,
    view: View,
}

impl MockCore {
    fn new(active: bool, view: View) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(active),
            received: Mutex::new(Vec::new()),
            view,
        })
    }

    fn received(&self) -> Vec<Node> {
        self.received.lock().unwrap().clone()
    }
}

impl Responder for MockCore {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn receive_node(&self, node: Node) {
        self.received.lock().unwrap().push(node);
    }

    fn read_view(&self) -> View {
        self.view.clone()
    }
}

/// Decodes like JSON but refuses to encode anything.
struct FailingCodec;

impl Codec for FailingCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode_node(&self, _: &Node) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Encode("refused".into()))
    }

    fn decode_node(&self, body: &[u8]) -> Result<Node, CodecError> {
        JsonCodec.decode_node(body)
    }

    fn encode_pull(&self, _: &MsgPullResp) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Encode("refused".into()))
    }

    fn decode_pull(&self, body: &[u8]) -> Result<MsgPullResp, CodecError> {
        JsonCodec.decode_pull(body)
    }

    fn encode_probe(&self, _: &MsgProbeResp) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Encode("refused".into()))
    }

    fn decode_probe(&self, body: &[u8]) -> Result<MsgProbeResp, CodecError> {
        JsonCodec.decode_probe(body)
    }
}

/// One node per line as `ip port`; probes as `active` or `inactive`.
struct LineCodec;

impl LineCodec {
    fn line(node: &Node) -> String {
        format!("{} {}\n", node.ip, node.port)
    }

    fn parse(line: &str) -> Result<Node, CodecError> {
        let (ip, port) = line
            .trim()
            .split_once(' ')
            .ok_or_else(|| CodecError::Decode(format!("malformed line {line:?}")))?;
        let ip: std::net::IpAddr = ip.parse().map_err(|e| CodecError::Decode(format!("{e}")))?;
        let port: u16 = port.parse().map_err(|e| CodecError::Decode(format!("{e}")))?;
        Ok(Node::new(ip, port))
    }

    fn text(body: &[u8]) -> Result<&str, CodecError> {
        std::str::from_utf8(body).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

impl Codec for LineCodec {
    fn content_type(&self) -> &'static str {
        "text/plain"
    }

    fn encode_node(&self, node: &Node) -> Result<Vec<u8>, CodecError> {
        Ok(Self::line(node).into_bytes())
    }

    fn decode_node(&self, body: &[u8]) -> Result<Node, CodecError> {
        Self::parse(Self::text(body)?)
    }

    fn encode_pull(&self, resp: &MsgPullResp) -> Result<Vec<u8>, CodecError> {
        Ok(resp.iter().map(Self::line).collect::<String>().into_bytes())
    }

    fn decode_pull(&self, body: &[u8]) -> Result<MsgPullResp, CodecError> {
        Self::text(body)?.lines().map(Self::parse).collect()
    }

    fn encode_probe(&self, resp: &MsgProbeResp) -> Result<Vec<u8>, CodecError> {
        let word = if resp.active { "active" } else { "inactive" };
        Ok(word.as_bytes().to_vec())
    }

    fn decode_probe(&self, body: &[u8]) -> Result<MsgProbeResp, CodecError> {
        match Self::text(body)? {
            "active" => Ok(MsgProbeResp { active: true }),
            "inactive" => Ok(MsgProbeResp { active: false }),
            other => Err(CodecError::Decode(format!("unknown probe answer {other:?}"))),
        }
    }
}

async fn serve(core: Arc<MockCore>, codec: Arc<dyn Codec>) -> SocketAddr {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(core, codec);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn local(port: u16) -> Node {
    Node::new(Ipv4Addr::LOCALHOST, port)
}

fn transport() -> HttpTransport {
    HttpTransport::new(Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn unknown_paths_and_methods_are_not_found() {
    let addr = serve(MockCore::new(true, View::new()), Arc::new(JsonCodec)).await;
    let client = reqwest::Client::new();

    let root = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(root.status(), reqwest::StatusCode::NOT_FOUND);

    let other = client.post(format!("http://{addr}/gossip")).send().await.unwrap();
    assert_eq!(other.status(), reqwest::StatusCode::NOT_FOUND);

    let get_probe = client.get(format!("http://{addr}/probe")).send().await.unwrap();
    assert_eq!(get_probe.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn probe_reports_activity() {
    for active in [true, false] {
        let addr = serve(MockCore::new(active, View::new()), Arc::new(JsonCodec)).await;
        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/probe"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);

        let body: MsgProbeResp = serde_json::from_slice(&resp.bytes().await.unwrap()).unwrap();
        assert_eq!(body.active, active);
    }
}

#[tokio::test]
async fn push_with_empty_body_is_rejected() {
    let core = MockCore::new(true, View::new());
    let addr = serve(core.clone(), Arc::new(JsonCodec)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/push"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(core.received().is_empty());
}

#[tokio::test]
async fn push_hands_node_to_core_once() {
    let core = MockCore::new(true, View::new());
    let addr = serve(core.clone(), Arc::new(JsonCodec)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/push"))
        .body(r#"{"ip": "127.0.0.1", "port": 11000}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(core.received(), vec![local(11000)]);
}

#[tokio::test]
async fn pull_returns_view_as_list() {
    let core = MockCore::new(true, View::from_nodes([local(8080)]));
    let addr = serve(core, Arc::new(JsonCodec)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/pull"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(
        resp.headers().get(reqwest::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let nodes: MsgPullResp = serde_json::from_slice(&resp.bytes().await.unwrap()).unwrap();
    assert_eq!(nodes, vec![local(8080)]);
}

#[tokio::test]
async fn encoder_failure_is_a_server_error() {
    let core = MockCore::new(true, View::from_nodes([local(8080)]));
    let addr = serve(core, Arc::new(FailingCodec)).await;
    let client = reqwest::Client::new();

    for path in ["pull", "probe"] {
        let resp = client.post(format!("http://{addr}/{path}")).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR, "{path}");
    }
}

#[tokio::test]
async fn transport_round_trips_through_handler() {
    let core = MockCore::new(true, View::from_nodes([local(8080), local(8081)]));
    let addr = serve(core.clone(), Arc::new(JsonCodec)).await;
    let peer = Node::from(addr);
    let t = transport();

    t.push(&local(9000), &peer).await.unwrap();
    assert_eq!(core.received(), vec![local(9000)]);

    let view = t.pull(&peer).await.unwrap();
    assert_eq!(view, View::from_nodes([local(8080), local(8081)]));

    assert!(t.probe(&peer).await.unwrap());
}

#[tokio::test]
async fn emit_acknowledges_delivered_messages() {
    let core = MockCore::new(true, View::new());
    let addr = serve(core.clone(), Arc::new(JsonCodec)).await;
    let peer = Node::from(addr);
    let me = local(9001);

    let (acks, mut rx) = mpsc::channel(1);
    let msg = brahms_core::transport::encode_push(&me).unwrap();
    transport().emit(&acks, me.hash(), &msg, &peer).await.unwrap();

    assert_eq!(rx.try_recv().unwrap(), me.hash());
    assert_eq!(core.received(), vec![me]);
}

#[tokio::test]
async fn server_errors_surface_as_status() {
    let addr = serve(MockCore::new(true, View::new()), Arc::new(FailingCodec)).await;
    let err = transport().pull(&Node::from(addr)).await.unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 500, .. }), "{err}");
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let peer = Node::from(listener.local_addr().unwrap());
    drop(listener);

    let err = transport().probe(&peer).await.unwrap_err();
    assert!(matches!(err, TransportError::Unreachable(_)), "{err}");
}

#[tokio::test]
async fn custom_codec_round_trips_through_handler() {
    let core = MockCore::new(true, View::from_nodes([local(8080), local(8081)]));
    let addr = serve(core.clone(), Arc::new(LineCodec)).await;
    let peer = Node::from(addr);
    let t = transport().with_codec(Arc::new(LineCodec));

    t.push(&local(9000), &peer).await.unwrap();
    assert_eq!(core.received(), vec![local(9000)]);

    let view = t.pull(&peer).await.unwrap();
    assert_eq!(view, View::from_nodes([local(8080), local(8081)]));

    assert!(t.probe(&peer).await.unwrap());

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/pull"))
        .send()
        .await
        .unwrap();
    let body = resp.text().await.unwrap();
    assert_eq!(body.lines().count(), 2);
    assert!(body.contains("127.0.0.1 8080"), "{body}");

    // A JSON client cannot read line bodies.
    let err = transport().pull(&peer).await.unwrap_err();
    assert!(matches!(err, TransportError::Encoding(_)), "{err}");
}

#[tokio::test]
async fn oversized_response_is_refused() {
    let core = MockCore::new(true, View::from_nodes((8000..8100).map(local)));
    let addr = serve(core, Arc::new(JsonCodec)).await;
    let peer = Node::from(addr);

    let err = transport()
        .with_max_response_bytes(256)
        .pull(&peer)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Encoding(_)), "{err}");
    assert!(err.to_string().contains("256"), "{err}");

    // Small answers still fit under the same cap.
    assert!(transport().with_max_response_bytes(256).probe(&peer).await.unwrap());
    assert_eq!(transport().pull(&peer).await.unwrap().len(), 100);
}
