//! Media engine boundary
//!
//! The engine owns ICE/DTLS/SRTP and RTP packetization; this crate only
//! drives it through capability loading and the transport handshakes. The
//! traits here are the whole surface the signaling core touches, so any
//! engine (a `webrtc`-crate binding, a browser bridge, a test double) plugs
//! in behind them.
//!
//! The engine-side negotiation steps are explicit async calls rather than
//! single-use events: the session reads the transport's DTLS parameters,
//! performs the server exchange, and reports the outcome back with
//! [`EngineTransport::complete_handshake`]. Single-use enforcement lives in
//! the session-side [`Transport`](crate::Transport) wrapper.

use crate::signaling::protocol::{
    ConsumeResponse, DtlsParameters, MediaKind, RtpCapabilities, RtpParameters,
    TransportDescriptor,
};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Factory for media devices.
///
/// # Errors
///
/// `make_device` fails with [`Error::UnsupportedEngine`] when the runtime
/// environment lacks the required media primitives; that error is fatal to
/// the session.
///
/// [`Error::UnsupportedEngine`]: crate::Error::UnsupportedEngine
pub trait EngineFactory: Send + Sync {
    /// Construct a media device instance
    fn make_device(&self) -> Result<Arc<dyn MediaDevice>>;
}

/// A loaded (or loadable) media engine device
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Initialize the device with the server router's capability set
    async fn load(&self, router_capabilities: &RtpCapabilities) -> Result<()>;

    /// The device's local capability set; meaningful after `load`
    fn rtp_capabilities(&self) -> RtpCapabilities;

    /// Whether the device can produce the given media kind
    fn can_produce(&self, kind: MediaKind) -> bool;

    /// Construct the engine side of a send transport from a server-issued
    /// descriptor
    fn create_send_transport(
        &self,
        descriptor: &TransportDescriptor,
    ) -> Result<Box<dyn EngineTransport>>;

    /// Construct the engine side of a receive transport
    fn create_recv_transport(
        &self,
        descriptor: &TransportDescriptor,
    ) -> Result<Box<dyn EngineTransport>>;
}

/// Engine side of one media transport (send or receive)
#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// Local DTLS parameters for the security handshake
    fn dtls_parameters(&self) -> DtlsParameters;

    /// Report the outcome of the server-side security handshake. The
    /// engine must not carry media until this is called with `true`.
    fn complete_handshake(&self, connected: bool);

    /// Bind a local track to this (send) transport, yielding the
    /// parameters the server's `produce` call needs
    async fn start_producing(&self, track: &LocalTrack) -> Result<ProducerInit>;

    /// Confirm the server-assigned producer id, letting media flow
    fn confirm_producer(&self, producer_id: &str);

    /// Materialize a playable local track for a server-side consumer on
    /// this (receive) transport
    async fn consume(&self, params: &ConsumeResponse) -> Result<Box<dyn RemoteTrack>>;

    /// Tear the engine transport down
    fn close(&self);
}

/// Parameters the engine assigns when binding a track for sending
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerInit {
    /// Media kind of the bound track
    pub kind: MediaKind,

    /// RTP parameters for the server's `produce` call
    pub rtp_parameters: RtpParameters,
}

/// A local media track, already acquired by the caller (camera/microphone
/// selection is outside this crate)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    /// Engine-side track identifier
    pub id: String,

    /// Media kind of the track
    pub kind: MediaKind,
}

impl LocalTrack {
    /// Create a track handle
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// A playable remote track materialized by the engine
pub trait RemoteTrack: Send + Sync {
    /// Engine-side track identifier
    fn id(&self) -> &str;

    /// Media kind of the track
    fn kind(&self) -> MediaKind;
}
