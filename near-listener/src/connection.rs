//! Per-connection handler.
//!
//! Each accepted link gets one read. The wire format carries no framing,
//! so whatever arrives in the first read is the message.

use crate::server::ServerMetrics;
use nearlink_client::Link;
use nearlink_types::MessageReceived;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// A message was read and emitted.
    Received(usize),
    /// The peer closed without sending anything.
    PeerDisconnected,
    /// The read failed.
    ReadFailed(String),
}

/// Service one inbound connection.
///
/// Reads up to `read_buffer` bytes once, emits a [`MessageReceived`] for a
/// non-empty read, and closes the link on every path.
pub async fn handle_connection(
    mut link: Box<dyn Link>,
    read_buffer: usize,
    messages: &mpsc::UnboundedSender<MessageReceived>,
    metrics: &ServerMetrics,
) -> ConnectionOutcome {
    let sender = link.peer().clone();
    let mut buf = vec![0u8; read_buffer.max(1)];

    let outcome = match link.read(&mut buf).await {
        Ok(0) => {
            debug!("Peer {} disconnected before sending", sender);
            metrics.empty_reads.fetch_add(1, Ordering::Relaxed);
            ConnectionOutcome::PeerDisconnected
        }
        Ok(n) => {
            buf.truncate(n);
            info!("Received {} bytes from {}", n, sender);
            metrics.messages_received.fetch_add(1, Ordering::Relaxed);
            let event = MessageReceived {
                payload: buf,
                sender: sender.clone(),
            };
            if messages.send(event).is_err() {
                debug!("No subscriber for message from {}", sender);
            }
            ConnectionOutcome::Received(n)
        }
        Err(e) => {
            warn!("Read from {} failed: {}", sender, e);
            metrics.handler_errors.fetch_add(1, Ordering::Relaxed);
            ConnectionOutcome::ReadFailed(e.to_string())
        }
    };

    if let Err(e) = link.close().await {
        debug!("Closing connection from {} failed: {}", sender, e);
    }
    outcome
}
