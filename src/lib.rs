//! SFU signaling client
//!
//! This crate implements the signaling side of joining a real-time
//! audio/video session hosted by a selective-forwarding media server:
//! capability negotiation, transport handshakes, and the produce/consume
//! paths, all over one correlated request/response channel.
//!
//! # Features
//!
//! - **Correlated signaling**: awaitable request/response calls over an
//!   asynchronous duplex channel, matched by id regardless of response
//!   arrival order
//! - **Transport negotiation**: strict multi-step produce/consume
//!   handshakes with single-use guards
//! - **Engine-agnostic**: the media engine (ICE/DTLS/SRTP, RTP) sits
//!   behind traits; any implementation plugs in
//! - **WebSocket channel binding**: ready-made signaling substrate over
//!   `tokio-tungstenite`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Session (controller, lifecycle state machine)       │
//! │  ├─ RequestCorrelator (id → pending completion)      │
//! │  │   ↕ ClientFrame / ServerFrame                     │
//! │  │   WebSocket binding or any duplex channel         │
//! │  ├─ Producer path (send transport + publish)         │
//! │  ├─ Consumer path (recv transport + subscribe)       │
//! │  │   └─ Transport (handshake state, one-shot guards) │
//! │  └─ MediaDevice / EngineTransport (external engine)  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sfu_client::{LocalTrack, MediaKind, Session, SessionConfig};
//!
//! let session = Session::new(SessionConfig::default(), engine_factory)?;
//! session.connect().await?;
//! session.negotiate().await?;
//!
//! // Publish the already-acquired camera track
//! let producer = session.publish(LocalTrack::new("cam0", MediaKind::Video)).await?;
//!
//! // React to remote publishers; subscribing stays the caller's call
//! session.on_new_producer(|_| println!("someone started publishing")).await;
//! let consumer = session.subscribe(None).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod signaling;

mod consumer;
mod producer;
mod session;
mod transport;

pub use config::SessionConfig;
pub use consumer::Consumer;
pub use engine::{
    EngineFactory, EngineTransport, LocalTrack, MediaDevice, ProducerInit, RemoteTrack,
};
pub use error::{Error, Result};
pub use producer::Producer;
pub use session::{NewProducerCallback, Session, SessionState};
pub use signaling::protocol::{
    DtlsParameters, MediaKind, RtpCapabilities, RtpParameters, TransportDescriptor,
};
pub use transport::{HandshakeState, Transport, TransportDirection};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
