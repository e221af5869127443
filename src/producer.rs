//! Producer path: publish a local track through a send transport
//!
//! Sequence: allocate a server-side send transport, run its security
//! handshake, then bind the track and register it with the server. A
//! handshake rejection marks the transport failed and nothing is bound;
//! a missing media capability fails before any signaling request, so no
//! partial server-side state is created.

use crate::engine::LocalTrack;
use crate::session::PathContext;
use crate::signaling::protocol::{
    CreateProducerTransportRequest, MediaKind, Method, TransportDescriptor,
};
use crate::transport::{Transport, TransportDirection};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Handle to one actively published track
pub struct Producer {
    /// Server-assigned producer identifier
    id: String,

    /// Media kind of the published track
    kind: MediaKind,

    /// The local track bound to the transport
    track: LocalTrack,

    /// Send transport carrying the track
    transport: Arc<Transport>,
}

impl Producer {
    /// Server-assigned producer identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Media kind of the published track
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// The published local track
    pub fn track(&self) -> &LocalTrack {
        &self.track
    }

    /// Identifier of the transport carrying the track
    pub fn transport_id(&self) -> &str {
        self.transport.id()
    }

    /// Stop publishing: tears down the transport, ending this producer's
    /// lifecycle
    pub async fn close(&self) {
        info!("closing producer {}", self.id);
        self.transport.close().await;
    }
}

/// Run the full publish sequence for one local track
pub(crate) async fn publish(ctx: &PathContext, track: LocalTrack) -> Result<Producer> {
    // Local capability check first: no server-side state may exist when
    // the source is unusable
    if !ctx.device.can_produce(track.kind) {
        return Err(Error::SourceUnavailable(format!(
            "device cannot produce {}",
            track.kind
        )));
    }

    debug!("publishing {} track {}", track.kind, track.id);

    let payload = serde_json::to_value(CreateProducerTransportRequest {
        prefer_udp: ctx.prefer_udp,
        rtp_capabilities: ctx.capabilities.clone(),
    })?;
    let descriptor: TransportDescriptor = serde_json::from_value(
        ctx.correlator
            .request(Method::CreateProducerTransport, payload)
            .await?,
    )?;

    let engine_transport = ctx.device.create_send_transport(&descriptor)?;
    let transport = Arc::new(Transport::new(
        descriptor.id,
        TransportDirection::Send,
        engine_transport,
    ));
    ctx.register_transport(&transport).await;

    transport.connect(&ctx.correlator).await?;
    let (producer_id, kind) = transport.produce(&ctx.correlator, &track).await?;

    info!("published {} track as producer {}", kind, producer_id);

    Ok(Producer {
        id: producer_id,
        kind,
        track,
        transport,
    })
}
