//! Session-side media transport wrapper
//!
//! Wraps one engine transport and drives its negotiation against the
//! server: the security handshake (`connect_*` requests) and, for send
//! transports, track binding (`produce`). Both steps are single-use per
//! transport, enforced with one-shot flags that fail fast on a second
//! invocation.

use crate::engine::{EngineTransport, LocalTrack, RemoteTrack};
use crate::signaling::protocol::{
    ConnectTransportRequest, ConsumeResponse, MediaKind, Method, ProduceRequest, ProduceResponse,
};
use crate::signaling::RequestCorrelator;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Direction of a media transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportDirection {
    /// Outbound media (producer path)
    Send,
    /// Inbound media (consumer path)
    Recv,
}

/// Security-handshake state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Handshake not yet performed
    Pending,
    /// Handshake acknowledged by the server; media may flow
    Connected,
    /// Handshake rejected or transport invalidated; never reused
    Failed,
}

/// Guard that arms exactly once, failing every later attempt
struct OneShot(AtomicBool);

impl OneShot {
    fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    fn arm(&self, step: &str) -> Result<()> {
        if self.0.swap(true, Ordering::SeqCst) {
            Err(Error::InvalidState(format!(
                "{} already ran for this transport",
                step
            )))
        } else {
            Ok(())
        }
    }
}

/// One secured media transport bound to a session.
///
/// Created from a server-issued descriptor; owned by the path that created
/// it and torn down when the session ends or negotiation fails.
pub struct Transport {
    /// Server-side transport identifier
    id: String,

    /// Send or receive
    direction: TransportDirection,

    /// Handshake state
    state: RwLock<HandshakeState>,

    /// Single-use guard for the security handshake
    connect_once: OneShot,

    /// Single-use guard for track binding (send transports)
    produce_once: OneShot,

    /// Engine side of the transport
    engine: Box<dyn EngineTransport>,
}

impl Transport {
    /// Wrap an engine transport under the server-assigned id
    pub(crate) fn new(
        id: String,
        direction: TransportDirection,
        engine: Box<dyn EngineTransport>,
    ) -> Self {
        debug!("created {:?} transport {}", direction, id);
        Self {
            id,
            direction,
            state: RwLock::new(HandshakeState::Pending),
            connect_once: OneShot::new(),
            produce_once: OneShot::new(),
            engine,
        }
    }

    /// Server-side transport identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Transport direction
    pub fn direction(&self) -> TransportDirection {
        self.direction
    }

    /// Current handshake state
    pub async fn state(&self) -> HandshakeState {
        *self.state.read().await
    }

    /// Fail unless the handshake has completed successfully
    pub(crate) async fn require_connected(&self) -> Result<()> {
        match *self.state.read().await {
            HandshakeState::Connected => Ok(()),
            state => Err(Error::TransportNotReady(format!(
                "transport {} handshake is {:?}",
                self.id, state
            ))),
        }
    }

    /// Run the security handshake: exchange the engine's DTLS parameters
    /// with the server and relay the outcome to the engine. Single-use.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] on a second invocation
    /// - [`Error::NegotiationFailed`] when the server rejects the
    ///   handshake; the transport is marked failed and never reused
    pub(crate) async fn connect(&self, correlator: &RequestCorrelator) -> Result<()> {
        self.connect_once.arm("security handshake")?;

        let method = match self.direction {
            TransportDirection::Send => Method::ConnectProducerTransport,
            TransportDirection::Recv => Method::ConnectConsumerTransport,
        };
        let payload = serde_json::to_value(ConnectTransportRequest {
            transport_id: self.id.clone(),
            dtls_parameters: self.engine.dtls_parameters(),
        })?;

        match correlator.request(method, payload).await {
            Ok(_ack) => {
                *self.state.write().await = HandshakeState::Connected;
                self.engine.complete_handshake(true);
                info!("transport {} handshake connected", self.id);
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = HandshakeState::Failed;
                self.engine.complete_handshake(false);
                warn!("transport {} handshake failed: {}", self.id, e);
                Err(match e {
                    Error::Request { message, .. } => Error::NegotiationFailed(message),
                    other => other,
                })
            }
        }
    }

    /// Bind a local track and register it with the server, returning the
    /// server-assigned producer id. Single-use; requires a connected
    /// handshake.
    pub(crate) async fn produce(
        &self,
        correlator: &RequestCorrelator,
        track: &LocalTrack,
    ) -> Result<(String, MediaKind)> {
        self.require_connected().await?;
        self.produce_once.arm("track binding")?;

        let init = self.engine.start_producing(track).await?;
        let payload = serde_json::to_value(ProduceRequest {
            transport_id: self.id.clone(),
            kind: init.kind,
            rtp_parameters: init.rtp_parameters,
        })?;

        let result = correlator.request(Method::Produce, payload).await?;
        let response: ProduceResponse = serde_json::from_value(result)?;

        self.engine.confirm_producer(&response.producer_id);
        debug!(
            "transport {} producing {} as {}",
            self.id, init.kind, response.producer_id
        );

        Ok((response.producer_id, init.kind))
    }

    /// Materialize a playable remote track for server-issued consumer
    /// parameters. Requires a connected handshake.
    pub(crate) async fn consume(&self, params: &ConsumeResponse) -> Result<Box<dyn RemoteTrack>> {
        self.require_connected().await?;
        self.engine.consume(params).await
    }

    /// Tear the transport down; it is unusable afterwards
    pub(crate) async fn close(&self) {
        let mut state = self.state.write().await;
        if *state != HandshakeState::Failed {
            debug!("closing transport {}", self.id);
            *state = HandshakeState::Failed;
        }
        self.engine.close();
    }
}
