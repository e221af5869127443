//! Session controller
//!
//! Owns one signaling channel and its lifecycle: opens the channel,
//! performs the one-time capability negotiation, runs producer/consumer
//! paths (any number, including concurrently), dispatches inbound frames
//! to the correlation layer, and forces disconnection when the channel
//! drops.

use crate::config::SessionConfig;
use crate::consumer::{self, Consumer};
use crate::engine::{EngineFactory, LocalTrack, MediaDevice};
use crate::producer::{self, Producer};
use crate::signaling::protocol::{error_text, EventKind, Method, RtpCapabilities, ServerFrame};
use crate::signaling::{websocket, ChannelPair, RequestCorrelator};
use crate::transport::Transport;
use crate::{Error, Result};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tracing::{debug, info, warn};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, channel not yet opened
    Idle,
    /// Channel open, capabilities not yet negotiated
    Connecting,
    /// Capabilities negotiated; producer/consumer paths may run
    Negotiated,
    /// Channel closed or negotiation failed; terminal
    Disconnected,
}

/// Callback fired when the server pushes a `newProducer` notification
pub type NewProducerCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Callback slots for server-pushed notifications
#[derive(Default)]
struct SessionCallbacks {
    on_new_producer: Mutex<Option<NewProducerCallback>>,
}

/// Everything a producer/consumer path needs from its session
pub(crate) struct PathContext {
    /// Correlated request issuer
    pub(crate) correlator: Arc<RequestCorrelator>,

    /// Negotiated media device
    pub(crate) device: Arc<dyn MediaDevice>,

    /// Local capability set, read-only after negotiation
    pub(crate) capabilities: RtpCapabilities,

    /// Transport allocation preference
    pub(crate) prefer_udp: bool,

    /// Session-wide transport registry, so disconnects invalidate every
    /// live transport
    transports: Arc<Mutex<Vec<Arc<Transport>>>>,
}

impl PathContext {
    /// Track a newly created transport for session-wide teardown
    pub(crate) async fn register_transport(&self, transport: &Arc<Transport>) {
        self.transports.lock().await.push(transport.clone());
    }
}

struct SessionInner {
    config: SessionConfig,
    factory: Arc<dyn EngineFactory>,
    state: RwLock<SessionState>,
    correlator: RwLock<Option<Arc<RequestCorrelator>>>,
    device: RwLock<Option<Arc<dyn MediaDevice>>>,
    capabilities: RwLock<Option<RtpCapabilities>>,
    transports: Arc<Mutex<Vec<Arc<Transport>>>>,
    callbacks: Arc<SessionCallbacks>,
    shutdown: Arc<Notify>,
    negotiate_lock: Mutex<()>,
}

impl SessionInner {
    /// Apply a state transition. `Disconnected` is terminal: once there,
    /// nothing moves the session out of it.
    async fn set_state(&self, new_state: SessionState) {
        let mut state = self.state.write().await;
        let old_state = *state;

        if old_state == SessionState::Disconnected || old_state == new_state {
            return;
        }

        debug!("session state transition: {:?} -> {:?}", old_state, new_state);
        *state = new_state;
    }

    /// Force the terminal state and invalidate every live transport
    async fn force_disconnect(&self) {
        self.set_state(SessionState::Disconnected).await;

        let transports: Vec<Arc<Transport>> =
            self.transports.lock().await.drain(..).collect();
        for transport in transports {
            transport.close().await;
        }
    }
}

/// One signaling session against an SFU server.
///
/// Cheaply clonable handle; all clones refer to the same session. A
/// process may hold any number of independent sessions.
///
/// # Example
///
/// ```ignore
/// use sfu_client::{LocalTrack, MediaKind, Session, SessionConfig};
///
/// let session = Session::new(SessionConfig::default(), engine)?;
/// session.connect().await?;
/// session.negotiate().await?;
///
/// let producer = session.publish(LocalTrack::new("cam0", MediaKind::Video)).await?;
/// let consumer = session.subscribe(None).await?;
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session in the `Idle` state
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: SessionConfig, factory: Arc<dyn EngineFactory>) -> Result<Self> {
        config.validate()?;

        info!("creating session for {}", config.signaling_url);

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                factory,
                state: RwLock::new(SessionState::Idle),
                correlator: RwLock::new(None),
                device: RwLock::new(None),
                capabilities: RwLock::new(None),
                transports: Arc::new(Mutex::new(Vec::new())),
                callbacks: Arc::new(SessionCallbacks::default()),
                shutdown: Arc::new(Notify::new()),
                negotiate_lock: Mutex::new(()),
            }),
        })
    }

    /// Open the session over an already-established channel pair.
    /// Moves `Idle -> Connecting` and starts the dispatch loop.
    pub async fn open(&self, channel: ChannelPair) -> Result<()> {
        let (outbound, inbound) = channel;

        {
            let mut state = self.inner.state.write().await;
            if *state != SessionState::Idle {
                return Err(Error::InvalidState(format!(
                    "session already opened (state: {:?})",
                    *state
                )));
            }
            debug!("session state transition: Idle -> Connecting");
            *state = SessionState::Connecting;
        }

        let correlator = Arc::new(RequestCorrelator::new(
            outbound,
            self.inner.config.request_timeout,
        ));
        *self.inner.correlator.write().await = Some(correlator.clone());

        tokio::spawn(dispatch_loop(
            inbound,
            correlator,
            self.inner.callbacks.clone(),
            self.inner.shutdown.clone(),
            Arc::downgrade(&self.inner),
        ));

        Ok(())
    }

    /// Connect to the configured signaling server over WebSocket and open
    /// the session on it
    pub async fn connect(&self) -> Result<()> {
        let channel = websocket::connect(&self.inner.config.signaling_url).await?;
        self.open(channel).await
    }

    /// Perform the one-time capability negotiation: fetch the server
    /// router's capabilities, construct the media device, and load it.
    /// Success moves the session to `Negotiated`; failure is fatal and
    /// moves it to `Disconnected` (retry policy belongs to the caller).
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyNegotiated`] on a second call
    /// - [`Error::UnsupportedEngine`] when the environment cannot host the
    ///   media engine
    pub async fn negotiate(&self) -> Result<RtpCapabilities> {
        let _guard = self.inner.negotiate_lock.lock().await;

        match *self.inner.state.read().await {
            SessionState::Connecting => {}
            SessionState::Negotiated => return Err(Error::AlreadyNegotiated),
            SessionState::Idle => {
                return Err(Error::InvalidState("session not opened yet".to_string()))
            }
            SessionState::Disconnected => return Err(Error::ChannelClosed),
        }

        match self.negotiate_inner().await {
            Ok(capabilities) => {
                self.inner.set_state(SessionState::Negotiated).await;
                info!("capability negotiation complete");
                Ok(capabilities)
            }
            Err(e) => {
                warn!("capability negotiation failed: {}", e);
                self.inner.force_disconnect().await;
                Err(e)
            }
        }
    }

    async fn negotiate_inner(&self) -> Result<RtpCapabilities> {
        let correlator = self.correlator().await?;

        let router_capabilities = RtpCapabilities(
            correlator
                .request(Method::GetRouterRtpCapabilities, json!({}))
                .await?,
        );

        let device = self.inner.factory.make_device()?;
        device.load(&router_capabilities).await?;
        let capabilities = device.rtp_capabilities();

        *self.inner.device.write().await = Some(device);
        *self.inner.capabilities.write().await = Some(capabilities.clone());

        Ok(capabilities)
    }

    /// Publish a local track. See [`Producer`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotNegotiated`] before a successful [`negotiate`](Self::negotiate);
    ///   no request reaches the server in that case
    /// - [`Error::SourceUnavailable`] when the device cannot produce the
    ///   track's kind; no request reaches the server
    /// - [`Error::NegotiationFailed`] when the server rejects the
    ///   transport's security handshake
    pub async fn publish(&self, track: LocalTrack) -> Result<Producer> {
        let ctx = self.path_context().await?;
        producer::publish(&ctx, track).await
    }

    /// Consume a remote producer's track. See [`Consumer`]. With no
    /// `producer_id` the server's selection policy applies.
    pub async fn subscribe(&self, producer_id: Option<&str>) -> Result<Consumer> {
        let ctx = self.path_context().await?;
        consumer::subscribe(&ctx, producer_id).await
    }

    /// Register the handler for the server-pushed `newProducer`
    /// notification. Passive: the session never subscribes on its own.
    pub async fn on_new_producer<F>(&self, callback: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        *self.inner.callbacks.on_new_producer.lock().await = Some(Arc::new(callback));
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        *self.inner.state.read().await
    }

    /// The negotiated local capability set, if negotiation has completed
    pub async fn rtp_capabilities(&self) -> Option<RtpCapabilities> {
        self.inner.capabilities.read().await.clone()
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Close the session: fail all pending requests, invalidate all
    /// transports, and move to `Disconnected`
    pub async fn close(&self) {
        info!("closing session");

        self.inner.shutdown.notify_one();
        if let Some(correlator) = self.inner.correlator.read().await.clone() {
            correlator.fail_all().await;
        }
        self.inner.force_disconnect().await;
    }

    async fn correlator(&self) -> Result<Arc<RequestCorrelator>> {
        self.inner
            .correlator
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::InvalidState("session not opened yet".to_string()))
    }

    async fn path_context(&self) -> Result<PathContext> {
        match *self.inner.state.read().await {
            SessionState::Negotiated => {}
            SessionState::Disconnected => return Err(Error::ChannelClosed),
            _ => return Err(Error::NotNegotiated),
        }

        let device = self
            .inner
            .device
            .read()
            .await
            .clone()
            .ok_or(Error::NotNegotiated)?;
        let capabilities = self
            .inner
            .capabilities
            .read()
            .await
            .clone()
            .ok_or(Error::NotNegotiated)?;

        Ok(PathContext {
            correlator: self.correlator().await?,
            device,
            capabilities,
            prefer_udp: self.inner.config.prefer_udp,
            transports: self.inner.transports.clone(),
        })
    }
}

/// Inbound frame router: responses and errors go to the correlation
/// layer, notifications to the registered callbacks. Runs until the
/// channel closes or the session is closed locally, then fails all
/// pending requests and disconnects the session.
async fn dispatch_loop(
    mut inbound: mpsc::UnboundedReceiver<ServerFrame>,
    correlator: Arc<RequestCorrelator>,
    callbacks: Arc<SessionCallbacks>,
    shutdown: Arc<Notify>,
    inner: Weak<SessionInner>,
) {
    loop {
        tokio::select! {
            frame = inbound.recv() => match frame {
                Some(ServerFrame::Response { id, result }) => {
                    correlator.complete(id, Ok(result)).await;
                }
                Some(ServerFrame::Error { id, error }) => {
                    correlator.complete(id, Err(error_text(&error))).await;
                }
                Some(ServerFrame::Notification { event, payload }) => match event {
                    EventKind::NewProducer => {
                        debug!("server pushed newProducer");
                        let callback = callbacks.on_new_producer.lock().await.clone();
                        match callback {
                            Some(callback) => callback(payload),
                            None => debug!("no newProducer handler registered"),
                        }
                    }
                    other => debug!("ignoring server notification {}", other),
                },
                None => {
                    info!("signaling channel closed");
                    break;
                }
            },
            _ = shutdown.notified() => {
                debug!("session closed locally");
                break;
            }
        }
    }

    correlator.fail_all().await;
    if let Some(inner) = inner.upgrade() {
        inner.force_disconnect().await;
    }

    debug!("dispatch loop terminated");
}
