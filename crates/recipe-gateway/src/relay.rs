//! Forwarding of upstream text fragments to a client response body

use bytes::Bytes;
use futures::StreamExt;
use std::io;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::error::GatewayError;
use crate::sse::TextStream;

/// Sender half feeding a streamed response body
pub type BodySender = mpsc::Sender<Result<Bytes, io::Error>>;

/// What the client received, and why the relay stopped if it stopped early
#[derive(Debug)]
pub struct RelayOutcome {
    pub text: String,
    pub error: Option<GatewayError>,
}

impl RelayOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Copy every fragment of `upstream` into `sink`, in order
///
/// The sink is dropped on return, which ends the client body. An upstream
/// failure is forwarded as an `io::Error` so the client sees an aborted
/// body rather than a clean end. A closed sink stops upstream reads at once.
pub async fn relay(mut upstream: TextStream, sink: BodySender) -> RelayOutcome {
    let mut text = String::new();

    loop {
        // A stalled upstream must not keep a departed client's task alive
        let item = tokio::select! {
            biased;
            _ = sink.closed() => {
                warn!("Client disconnected after {} bytes", text.len());
                return RelayOutcome {
                    text,
                    error: Some(GatewayError::ClientDisconnected),
                };
            }
            item = upstream.next() => item,
        };

        let Some(item) = item else {
            break;
        };

        match item {
            Ok(fragment) => {
                if fragment.is_empty() {
                    continue;
                }

                if sink
                    .send(Ok(Bytes::copy_from_slice(fragment.as_bytes())))
                    .await
                    .is_err()
                {
                    warn!("Client disconnected after {} bytes", text.len());
                    return RelayOutcome {
                        text,
                        error: Some(GatewayError::ClientDisconnected),
                    };
                }

                text.push_str(&fragment);
            }
            Err(err) => {
                error!("Upstream stream failed after {} bytes: {}", text.len(), err);
                let _ = sink.send(Err(io::Error::other(err.to_string()))).await;
                return RelayOutcome {
                    text,
                    error: Some(err),
                };
            }
        }
    }

    RelayOutcome { text, error: None }
}
