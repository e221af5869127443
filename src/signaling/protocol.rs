//! Wire types for the SFU signaling protocol
//!
//! Every exchange rides one duplex channel as a typed frame: correlated
//! requests (`{id, method, payload}` answered by `{id, result}` or
//! `{id, error}`) and uncorrelated notifications (`{event, payload}`).
//! Capability and parameter blobs that the client merely forwards between
//! server and media engine are carried opaquely.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Correlation identifier tagging a request so its response can be matched
pub type RequestId = u64;

/// Signaling request methods understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Fetch the server router's supported codecs/extensions
    #[serde(rename = "getRouterRtpCapabilities")]
    GetRouterRtpCapabilities,
    /// Allocate a server-side send transport
    #[serde(rename = "createProducerTransport")]
    CreateProducerTransport,
    /// Complete the security handshake of a send transport
    #[serde(rename = "connectProducerTransport")]
    ConnectProducerTransport,
    /// Bind a published track to a send transport
    #[serde(rename = "produce")]
    Produce,
    /// Allocate a server-side receive transport
    #[serde(rename = "createConsumerTransport")]
    CreateConsumerTransport,
    /// Complete the security handshake of a receive transport
    #[serde(rename = "connectConsumerTransport")]
    ConnectConsumerTransport,
    /// Request a consumable track for a remote producer
    #[serde(rename = "consume")]
    Consume,
}

impl Method {
    /// Wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GetRouterRtpCapabilities => "getRouterRtpCapabilities",
            Method::CreateProducerTransport => "createProducerTransport",
            Method::ConnectProducerTransport => "connectProducerTransport",
            Method::Produce => "produce",
            Method::CreateConsumerTransport => "createConsumerTransport",
            Method::ConnectConsumerTransport => "connectConsumerTransport",
            Method::Consume => "consume",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uncorrelated notification events (either direction, no response)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Server push: a remote participant started publishing
    #[serde(rename = "newProducer")]
    NewProducer,
    /// Client fire-and-forget: a consumer became active
    #[serde(rename = "newConsumer")]
    NewConsumer,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::NewProducer => "newProducer",
            EventKind::NewConsumer => "newConsumer",
        })
    }
}

/// Client-to-server frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClientFrame {
    /// Correlated request; the server answers with a matching response
    Request {
        /// Correlation identifier, unique among outstanding requests
        id: RequestId,
        /// Method to invoke
        method: Method,
        /// Method payload
        payload: Value,
    },
    /// Fire-and-forget notification, no response expected
    Notification {
        /// Event name
        event: EventKind,
        /// Event payload
        #[serde(default)]
        payload: Value,
    },
}

/// Server-to-client frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServerFrame {
    /// Successful response to a correlated request
    Response {
        /// Correlation identifier of the request being answered
        id: RequestId,
        /// Result payload
        result: Value,
    },
    /// Error response to a correlated request
    Error {
        /// Correlation identifier of the request being answered
        id: RequestId,
        /// Error payload (a message string or an object with a `message`)
        error: Value,
    },
    /// Server push notification
    Notification {
        /// Event name
        event: EventKind,
        /// Event payload
        #[serde(default)]
        payload: Value,
    },
}

/// Render a server error payload as a message string
pub fn error_text(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// Media kind of a track, producer, or consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        })
    }
}

/// Negotiated codec/extension capability set. Produced by the server router
/// or the local media engine; the client forwards it without interpreting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RtpCapabilities(pub Value);

/// Per-track RTP send/receive parameters, interpreted only by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RtpParameters(pub Value);

/// DTLS role/fingerprint parameters for the security handshake
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DtlsParameters(pub Value);

/// ICE username/password parameters issued by the server
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct IceParameters(pub Value);

/// Server-issued parameters for constructing a local transport.
/// Immutable once received; consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransportDescriptor {
    /// Server-side transport identifier
    pub id: String,

    /// ICE parameters for connectivity establishment
    pub ice_parameters: IceParameters,

    /// ICE candidate list
    pub ice_candidates: Vec<Value>,

    /// Server DTLS parameters
    pub dtls_parameters: DtlsParameters,
}

/// Payload for `createProducerTransport`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateProducerTransportRequest {
    /// Prefer UDP over TCP for the media path
    pub prefer_udp: bool,

    /// Local capability set from the negotiated device
    pub rtp_capabilities: RtpCapabilities,
}

/// Payload for `createConsumerTransport`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsumerTransportRequest {
    /// Prefer UDP over TCP for the media path
    pub prefer_udp: bool,
}

/// Payload for `connectProducerTransport` / `connectConsumerTransport`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTransportRequest {
    /// Transport being connected
    pub transport_id: String,

    /// Local DTLS parameters
    pub dtls_parameters: DtlsParameters,
}

/// Payload for `produce`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRequest {
    /// Send transport carrying the track
    pub transport_id: String,

    /// Track media kind
    pub kind: MediaKind,

    /// RTP parameters the engine assigned to the track
    pub rtp_parameters: RtpParameters,
}

/// Result of `produce`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProduceResponse {
    /// Server-assigned producer identifier
    pub producer_id: String,
}

/// Payload for `consume`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    /// Local capability set, so the server picks a compatible codec
    pub rtp_capabilities: RtpCapabilities,

    /// Remote producer to consume; the server's selection policy applies
    /// when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer_id: Option<String>,
}

/// Result of `consume`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeResponse {
    /// Remote producer being consumed
    pub producer_id: String,

    /// Server-assigned consumer identifier
    pub consumer_id: String,

    /// Media kind of the consumed track
    pub kind: MediaKind,

    /// RTP parameters for materializing the local track
    pub rtp_parameters: RtpParameters,
}
