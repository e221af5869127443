//! Test harness for signaling-client integration tests
//!
//! Provides:
//! - A scripted in-process SFU signaling server speaking the typed frame
//!   protocol over an in-memory channel pair
//! - A mock media engine that records every call the client drives it
//!   through
//! - Helpers for building sessions in known states

use serde_json::{json, Value};
use sfu_client::engine::{
    EngineFactory, EngineTransport, LocalTrack, MediaDevice, ProducerInit, RemoteTrack,
};
use sfu_client::signaling::protocol::{
    ClientFrame, ConsumeResponse, DtlsParameters, EventKind, MediaKind, Method, RtpCapabilities,
    RtpParameters, ServerFrame, TransportDescriptor,
};
use sfu_client::signaling::ChannelPair;
use sfu_client::{Result, Session, SessionConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Initialize tracing output for a test (safe to call repeatedly)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// ===== Mock media engine =====

/// Record of everything the client drove the mock engine through
#[derive(Default)]
pub struct EngineLog {
    /// `(transport_id, connected)` per handshake outcome relayed to the
    /// engine
    pub handshakes: Mutex<Vec<(String, bool)>>,

    /// Producer ids confirmed to the engine
    pub confirmed_producers: Mutex<Vec<String>>,

    /// Router capability sets loaded into the device
    pub loaded: Mutex<Vec<RtpCapabilities>>,

    /// Engine transports closed
    pub closed_transports: AtomicUsize,
}

impl EngineLog {
    /// Handshake outcomes recorded for one transport
    pub fn handshakes_for(&self, transport_id: &str) -> Vec<bool> {
        self.handshakes
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == transport_id)
            .map(|(_, connected)| *connected)
            .collect()
    }
}

/// Mock engine factory; hands out [`MockDevice`]s sharing one log
pub struct MockEngineFactory {
    log: Arc<EngineLog>,
    deny_kind: Option<MediaKind>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(EngineLog::default()),
            deny_kind: None,
        }
    }

    /// Make `can_produce` report false for the given kind
    pub fn deny(mut self, kind: MediaKind) -> Self {
        self.deny_kind = Some(kind);
        self
    }

    pub fn log(&self) -> Arc<EngineLog> {
        self.log.clone()
    }
}

impl EngineFactory for MockEngineFactory {
    fn make_device(&self) -> Result<Arc<dyn MediaDevice>> {
        Ok(Arc::new(MockDevice {
            log: self.log.clone(),
            deny_kind: self.deny_kind,
        }))
    }
}

struct MockDevice {
    log: Arc<EngineLog>,
    deny_kind: Option<MediaKind>,
}

#[async_trait::async_trait]
impl MediaDevice for MockDevice {
    async fn load(&self, router_capabilities: &RtpCapabilities) -> Result<()> {
        self.log
            .loaded
            .lock()
            .unwrap()
            .push(router_capabilities.clone());
        Ok(())
    }

    fn rtp_capabilities(&self) -> RtpCapabilities {
        RtpCapabilities(json!({"codecs": ["audio/opus", "video/VP8"]}))
    }

    fn can_produce(&self, kind: MediaKind) -> bool {
        self.deny_kind != Some(kind)
    }

    fn create_send_transport(
        &self,
        descriptor: &TransportDescriptor,
    ) -> Result<Box<dyn EngineTransport>> {
        Ok(Box::new(MockEngineTransport {
            id: descriptor.id.clone(),
            log: self.log.clone(),
        }))
    }

    fn create_recv_transport(
        &self,
        descriptor: &TransportDescriptor,
    ) -> Result<Box<dyn EngineTransport>> {
        Ok(Box::new(MockEngineTransport {
            id: descriptor.id.clone(),
            log: self.log.clone(),
        }))
    }
}

struct MockEngineTransport {
    id: String,
    log: Arc<EngineLog>,
}

#[async_trait::async_trait]
impl EngineTransport for MockEngineTransport {
    fn dtls_parameters(&self) -> DtlsParameters {
        DtlsParameters(json!({"role": "client", "fingerprints": []}))
    }

    fn complete_handshake(&self, connected: bool) {
        self.log
            .handshakes
            .lock()
            .unwrap()
            .push((self.id.clone(), connected));
    }

    async fn start_producing(&self, track: &LocalTrack) -> Result<ProducerInit> {
        Ok(ProducerInit {
            kind: track.kind,
            rtp_parameters: RtpParameters(json!({"mid": track.id})),
        })
    }

    fn confirm_producer(&self, producer_id: &str) {
        self.log
            .confirmed_producers
            .lock()
            .unwrap()
            .push(producer_id.to_string());
    }

    async fn consume(&self, params: &ConsumeResponse) -> Result<Box<dyn RemoteTrack>> {
        Ok(Box::new(MockRemoteTrack {
            id: format!("track-{}", params.consumer_id),
            kind: params.kind,
        }))
    }

    fn close(&self) {
        self.log.closed_transports.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockRemoteTrack {
    id: String,
    kind: MediaKind,
}

impl RemoteTrack for MockRemoteTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }
}

// ===== Scripted signaling server =====

/// How the scripted server answers requests
#[derive(Debug, Clone, Copy, Default)]
pub struct SfuBehavior {
    /// Reject `connectProducerTransport` with an error payload
    pub reject_producer_connect: bool,

    /// Record requests but never answer any of them
    pub silent: bool,
}

enum ServerOp {
    Push(ServerFrame),
    Close,
}

/// In-process scripted SFU signaling server over an in-memory channel
pub struct TestServer {
    requests: Arc<Mutex<Vec<(Method, Value)>>>,
    notifications: Arc<Mutex<Vec<(EventKind, Value)>>>,
    ops: mpsc::UnboundedSender<ServerOp>,
}

impl TestServer {
    /// Start the server task; returns the channel pair for the session
    /// under test and the server handle
    pub fn start(behavior: SfuBehavior) -> (ChannelPair, TestServer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let notifications = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn(server_task(
            behavior,
            out_rx,
            in_tx,
            ops_rx,
            requests.clone(),
            notifications.clone(),
        ));

        let server = TestServer {
            requests,
            notifications,
            ops: ops_tx,
        };

        ((out_tx, in_rx), server)
    }

    /// Methods of every request received, in arrival order
    pub fn request_methods(&self) -> Vec<Method> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(method, _)| *method)
            .collect()
    }

    /// Payload of the first request for `method`, if any arrived
    pub fn request_payload(&self, method: Method) -> Option<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, payload)| payload.clone())
    }

    /// Fire-and-forget notifications received, in arrival order
    pub fn notified_events(&self) -> Vec<EventKind> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|(event, _)| *event)
            .collect()
    }

    /// Push a `newProducer` notification to the client
    pub fn push_new_producer(&self) {
        self.ops
            .send(ServerOp::Push(ServerFrame::Notification {
                event: EventKind::NewProducer,
                payload: Value::Null,
            }))
            .unwrap();
    }

    /// Close the server side of the channel
    pub fn close(&self) {
        let _ = self.ops.send(ServerOp::Close);
    }

    /// Wait until at least `count` requests have been recorded
    pub async fn wait_for_requests(&self, count: usize) {
        wait_until(|| self.requests.lock().unwrap().len() >= count).await;
    }

    /// Wait until at least `count` notifications have been recorded
    pub async fn wait_for_notifications(&self, count: usize) {
        wait_until(|| self.notifications.lock().unwrap().len() >= count).await;
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached within 1s");
}

async fn server_task(
    behavior: SfuBehavior,
    mut out_rx: mpsc::UnboundedReceiver<ClientFrame>,
    in_tx: mpsc::UnboundedSender<ServerFrame>,
    mut ops_rx: mpsc::UnboundedReceiver<ServerOp>,
    requests: Arc<Mutex<Vec<(Method, Value)>>>,
    notifications: Arc<Mutex<Vec<(EventKind, Value)>>>,
) {
    let mut counter = 0u32;

    loop {
        tokio::select! {
            frame = out_rx.recv() => match frame {
                Some(ClientFrame::Request { id, method, payload }) => {
                    debug!("test server received {} (id={})", method, id);
                    requests.lock().unwrap().push((method, payload.clone()));

                    if behavior.silent {
                        continue;
                    }

                    counter += 1;
                    let reply = respond(&behavior, method, &payload, counter);
                    let frame = match reply {
                        Ok(result) => ServerFrame::Response { id, result },
                        Err(message) => ServerFrame::Error {
                            id,
                            error: json!(message),
                        },
                    };
                    if in_tx.send(frame).is_err() {
                        break;
                    }
                }
                Some(ClientFrame::Notification { event, payload }) => {
                    debug!("test server received notification {}", event);
                    notifications.lock().unwrap().push((event, payload));
                }
                None => break,
            },
            op = ops_rx.recv() => match op {
                Some(ServerOp::Push(frame)) => {
                    if in_tx.send(frame).is_err() {
                        break;
                    }
                }
                Some(ServerOp::Close) | None => break,
            },
        }
    }

    debug!("test server terminated");
}

/// Default SFU responses, one per protocol method
fn respond(
    behavior: &SfuBehavior,
    method: Method,
    payload: &Value,
    counter: u32,
) -> std::result::Result<Value, String> {
    match method {
        Method::GetRouterRtpCapabilities => {
            Ok(json!({"codecs": ["audio/opus", "video/VP8"], "headerExtensions": []}))
        }
        Method::CreateProducerTransport => Ok(descriptor_json(format!("send-{}", counter))),
        Method::CreateConsumerTransport => Ok(descriptor_json(format!("recv-{}", counter))),
        Method::ConnectProducerTransport => {
            if behavior.reject_producer_connect {
                Err("dtls fingerprint mismatch".to_string())
            } else {
                Ok(json!({}))
            }
        }
        Method::ConnectConsumerTransport => Ok(json!({})),
        Method::Produce => Ok(json!({"producerId": format!("prod-{}", uuid::Uuid::new_v4())})),
        Method::Consume => {
            let producer_id = payload
                .get("producerId")
                .and_then(Value::as_str)
                .unwrap_or("prod-remote")
                .to_string();
            Ok(json!({
                "producerId": producer_id,
                "consumerId": format!("cons-{}", uuid::Uuid::new_v4()),
                "kind": "video",
                "rtpParameters": {"mid": "0"},
            }))
        }
    }
}

fn descriptor_json(id: String) -> Value {
    json!({
        "id": id,
        "iceParameters": {"usernameFragment": "frag", "password": "pwd"},
        "iceCandidates": [{"ip": "127.0.0.1", "port": 40000, "protocol": "udp"}],
        "dtlsParameters": {"role": "auto", "fingerprints": []},
    })
}

// ===== Session builders =====

/// A session that has been opened against a fresh test server
pub async fn open_session(
    behavior: SfuBehavior,
    factory: MockEngineFactory,
) -> (Session, TestServer, Arc<EngineLog>) {
    let log = factory.log();
    let session = Session::new(SessionConfig::default(), Arc::new(factory)).unwrap();
    let (channel, server) = TestServer::start(behavior);
    session.open(channel).await.unwrap();
    (session, server, log)
}

/// A session that has completed capability negotiation
pub async fn negotiated_session(
    behavior: SfuBehavior,
    factory: MockEngineFactory,
) -> (Session, TestServer, Arc<EngineLog>) {
    let (session, server, log) = open_session(behavior, factory).await;
    session.negotiate().await.unwrap();
    (session, server, log)
}
