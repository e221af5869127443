//! Consumer path: receive a remote producer's track over a receive
//! transport
//!
//! Sequence: allocate a server-side receive transport, run its security
//! handshake, request a consumable track, materialize it locally, then
//! tell the server the consumer is live. Ordering is strict: the
//! `consume` request is never issued before the handshake has been
//! acknowledged for the same transport.

use crate::engine::RemoteTrack;
use crate::session::PathContext;
use crate::signaling::protocol::{
    ConsumeRequest, ConsumeResponse, CreateConsumerTransportRequest, EventKind, MediaKind, Method,
    TransportDescriptor,
};
use crate::transport::{Transport, TransportDirection};
use crate::Result;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Handle to one actively received remote track
pub struct Consumer {
    /// Server-assigned consumer identifier
    id: String,

    /// Remote producer being consumed
    producer_id: String,

    /// Media kind of the consumed track
    kind: MediaKind,

    /// Playable track materialized by the engine
    track: Box<dyn RemoteTrack>,

    /// Receive transport carrying the track
    transport: Arc<Transport>,
}

impl Consumer {
    /// Server-assigned consumer identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identifier of the remote producer being consumed
    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    /// Media kind of the consumed track
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// The playable remote track
    pub fn track(&self) -> &dyn RemoteTrack {
        self.track.as_ref()
    }

    /// Identifier of the transport carrying the track
    pub fn transport_id(&self) -> &str {
        self.transport.id()
    }

    /// Stop consuming: tears down the transport, ending this consumer's
    /// lifecycle
    pub async fn close(&self) {
        info!("closing consumer {}", self.id);
        self.transport.close().await;
    }
}

/// Run the full subscribe sequence. `producer_id` is forwarded verbatim;
/// when absent the server's selection policy picks the producer.
pub(crate) async fn subscribe(
    ctx: &PathContext,
    producer_id: Option<&str>,
) -> Result<Consumer> {
    debug!("subscribing (producer: {:?})", producer_id);

    let payload = serde_json::to_value(CreateConsumerTransportRequest {
        prefer_udp: ctx.prefer_udp,
    })?;
    let descriptor: TransportDescriptor = serde_json::from_value(
        ctx.correlator
            .request(Method::CreateConsumerTransport, payload)
            .await?,
    )?;

    let engine_transport = ctx.device.create_recv_transport(&descriptor)?;
    let transport = Arc::new(Transport::new(
        descriptor.id,
        TransportDirection::Recv,
        engine_transport,
    ));
    ctx.register_transport(&transport).await;

    transport.connect(&ctx.correlator).await?;

    // The handshake ack above is a hard prerequisite for consume
    transport.require_connected().await?;
    let payload = serde_json::to_value(ConsumeRequest {
        rtp_capabilities: ctx.capabilities.clone(),
        producer_id: producer_id.map(str::to_owned),
    })?;
    let params: ConsumeResponse =
        serde_json::from_value(ctx.correlator.request(Method::Consume, payload).await?)?;

    let track = transport.consume(&params).await?;

    // Informational only; the server expects no response
    ctx.correlator.notify(EventKind::NewConsumer, json!({}))?;

    info!(
        "consuming {} track from producer {} as consumer {}",
        params.kind, params.producer_id, params.consumer_id
    );

    Ok(Consumer {
        id: params.consumer_id,
        producer_id: params.producer_id,
        kind: params.kind,
        track,
        transport,
    })
}
