//! Event envelopes and subscriber delivery.
//!
//! Delivery is best-effort and ordered per session: events travel over one
//! unbounded channel to whichever subscriber is currently attached, in
//! emission order. A detached or slow subscriber never blocks the session.
//!
//! Note on `error` events: chunks arriving on the sandbox's stderr stream
//! are relayed as non-terminal `error` events. The terminal signal — exactly
//! one `execution_complete` or `error` per session — is always the last
//! event emitted.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events delivered to a session's subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A chunk of program output.
    Output {
        /// Output text (lossily decoded after demultiplexing).
        data: String,
    },
    /// A stderr chunk or a terminal failure report.
    Error {
        /// Human-readable message.
        message: String,
    },
    /// The program appears blocked waiting for input (advisory).
    InputRequired,
    /// The program ran to completion.
    ExecutionComplete,
}

/// Sending half of a subscriber's event channel.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    /// Create a sink and the receiving half the transport drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event. Best-effort: a gone subscriber drops the event.
    pub fn send(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Subscriber channel closed, event dropped");
        }
    }

    /// Whether the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
