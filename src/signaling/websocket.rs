//! WebSocket binding for the duplex signaling channel
//!
//! Adapts a `tokio-tungstenite` stream to the typed frame pair the session
//! consumes: a sender task drains outbound [`ClientFrame`]s and a receiver
//! task decodes inbound text frames into [`ServerFrame`]s. Closing the
//! socket (or a socket error) ends the inbound stream, which the session
//! treats as a channel-level disconnect.

use crate::signaling::protocol::{ClientFrame, ServerFrame};
use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Endpoints of an open signaling channel: the outbound frame sender and
/// the inbound frame receiver
pub type ChannelPair = (
    mpsc::UnboundedSender<ClientFrame>,
    mpsc::UnboundedReceiver<ServerFrame>,
);

/// Connect to a signaling server over WebSocket.
///
/// Establishes the connection and starts the background sender/receiver
/// tasks; the returned pair plugs directly into [`Session::open`].
///
/// [`Session::open`]: crate::Session::open
pub async fn connect(url: &str) -> Result<ChannelPair> {
    info!("connecting to signaling server: {}", url);

    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| Error::WebSocket(format!("failed to connect to {}: {}", url, e)))?;

    info!("connected to signaling server");

    let (write, read) = ws_stream.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    tokio::spawn(sender_task(write, out_rx));
    tokio::spawn(receiver_task(read, in_tx));

    Ok((out_tx, in_rx))
}

/// Sender task: encodes outbound frames and writes them to the socket
async fn sender_task(
    mut write: futures::stream::SplitSink<WsStream, Message>,
    mut out_rx: mpsc::UnboundedReceiver<ClientFrame>,
) {
    while let Some(frame) = out_rx.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to encode outbound frame: {}", e);
                continue;
            }
        };

        if let Err(e) = write.send(Message::Text(text)).await {
            error!("failed to send WebSocket message: {}", e);
            break;
        }
    }

    debug!("sender task terminated");
}

/// Receiver task: decodes inbound text frames and forwards them to the
/// session. Dropping `in_tx` on exit signals the disconnect.
async fn receiver_task(
    mut read: futures::stream::SplitStream<WsStream>,
    in_tx: mpsc::UnboundedSender<ServerFrame>,
) {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerFrame>(&text) {
                Ok(frame) => {
                    if in_tx.send(frame).is_err() {
                        debug!("session dropped the inbound channel");
                        break;
                    }
                }
                Err(e) => warn!("undecodable signaling frame: {} ({})", text, e),
            },
            Ok(Message::Close(_)) => {
                info!("WebSocket connection closed by server");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    debug!("receiver task terminated");
}
