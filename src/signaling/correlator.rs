//! Correlated request/response layer over the duplex signaling channel
//!
//! Turns fire-and-forget frame emission into awaitable calls: each request
//! parks a oneshot completion handle under a fresh correlation id, and the
//! session's dispatch loop resolves it when the matching response frame
//! arrives, in whatever order responses come back.

use crate::signaling::protocol::{ClientFrame, EventKind, Method, RequestId};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

/// Outcome delivered to a pending request: the result payload, or the
/// server's error message
type ResponseOutcome = std::result::Result<Value, String>;

/// Correlated request issuer over one signaling channel.
///
/// Requests are delivered to the channel in call order; responses may
/// arrive out of order and are matched by correlation id. When the channel
/// closes, every outstanding request fails with [`Error::ChannelClosed`]
/// and the pending registry is left empty.
pub struct RequestCorrelator {
    /// Next correlation id; monotonically increasing, so ids are unique
    /// among outstanding requests
    next_id: AtomicU64,

    /// Outstanding requests by correlation id
    pending: Mutex<HashMap<RequestId, oneshot::Sender<ResponseOutcome>>>,

    /// Outbound frame sender
    outbound: mpsc::UnboundedSender<ClientFrame>,

    /// Optional per-request timeout; the base design waits indefinitely
    timeout: Option<Duration>,
}

impl RequestCorrelator {
    /// Create a correlator writing to the given outbound frame sender
    pub fn new(outbound: mpsc::UnboundedSender<ClientFrame>, timeout: Option<Duration>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            outbound,
            timeout,
        }
    }

    /// Issue a request and suspend until its response arrives, the channel
    /// closes, or the configured timeout (if any) expires.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] if the channel drops before the response
    /// - [`Error::Request`] if the server answers with an error payload
    /// - [`Error::RequestTimeout`] if a configured timeout expires
    pub async fn request(&self, method: Method, payload: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        self.pending.lock().await.insert(id, tx);
        debug!("sending request {} (id={})", method, id);

        let frame = ClientFrame::Request {
            id,
            method,
            payload,
        };
        if self.outbound.send(frame).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(Error::ChannelClosed);
        }

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.lock().await.remove(&id);
                    warn!("request {} (id={}) timed out after {:?}", method, id, limit);
                    return Err(Error::RequestTimeout(method));
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(Error::Request { method, message }),
            // Sender dropped without a response: the channel closed
            Err(_) => Err(Error::ChannelClosed),
        }
    }

    /// Send a fire-and-forget notification, no response expected
    pub fn notify(&self, event: EventKind, payload: Value) -> Result<()> {
        debug!("sending notification {}", event);
        self.outbound
            .send(ClientFrame::Notification { event, payload })
            .map_err(|_| Error::ChannelClosed)
    }

    /// Resolve the pending request matching `id` with a response outcome.
    /// Called by the session dispatch loop for every response frame.
    pub async fn complete(&self, id: RequestId, outcome: ResponseOutcome) {
        match self.pending.lock().await.remove(&id) {
            Some(tx) => {
                // The caller may have given up (timeout); nothing to do then
                let _ = tx.send(outcome);
            }
            None => warn!("response for unknown request id {}", id),
        }
    }

    /// Fail every outstanding request with [`Error::ChannelClosed`],
    /// leaving the pending registry empty
    pub async fn fail_all(&self) {
        let mut pending = self.pending.lock().await;
        let outstanding = pending.len();
        if outstanding > 0 {
            debug!("failing {} outstanding request(s)", outstanding);
        }
        // Dropping the senders rejects the waiting callers
        pending.clear();
    }

    /// Number of outstanding requests
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
