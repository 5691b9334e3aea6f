//! Channel-backed connection capability.
//!
//! Outbound frames travel over a bounded `mpsc` queue to a per-connection
//! writer task. A full queue is the backpressure signal: the frame is dropped
//! and the sender carries on. Closing is signalled over a `watch` channel so
//! that both the reader and the writer of the stream observe it.

use super::Connection;
use crate::error::DeliveryError;
use tokio::sync::{mpsc, watch};

/// The lobby-facing half of a connection.
#[derive(Debug)]
pub struct ChannelConnection {
    frames: mpsc::Sender<String>,
    closed: watch::Sender<bool>,
}

/// The transport-facing half: queued frames plus the close signal.
#[derive(Debug)]
pub struct OutboundReceiver {
    pub frames: mpsc::Receiver<String>,
    pub closed: watch::Receiver<bool>,
}

impl ChannelConnection {
    /// Creates a connection whose outbound queue holds at most `capacity` frames.
    pub fn new(capacity: usize) -> (Self, OutboundReceiver) {
        let (frames_tx, frames_rx) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);
        (
            Self {
                frames: frames_tx,
                closed: closed_tx,
            },
            OutboundReceiver {
                frames: frames_rx,
                closed: closed_rx,
            },
        )
    }

    /// Another receiver for the close signal, for the read side of the stream.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

impl Connection for ChannelConnection {
    fn try_send(&self, frame: String) -> Result<(), DeliveryError> {
        if *self.closed.borrow() {
            return Err(DeliveryError::Closed);
        }
        self.frames.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Saturated,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.frames.is_closed()
    }
}

/// Resolves once the close signal is raised or its sender is gone.
pub async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}
