//! Session types - one session per client-visible execution run.

use crate::prompt::PromptDetector;
use crate::provider::SandboxInstance;
use crate::relay::{EventSink, SessionEvent};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Unique identifier for a session. Issued by the gateway, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Current state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Allocated (possibly only as a subscriber placeholder), no sandbox yet.
    Created,
    /// Sandbox is being provisioned/started.
    Starting,
    /// Program is executing.
    Running,
    /// Program appears blocked on interactive input (advisory; never gates
    /// output delivery).
    AwaitingInput,
    /// Program finished on its own.
    Completed,
    /// Provisioning, start, or a stream failed.
    Failed,
    /// Execution budget exhausted.
    TimedOut,
    /// Torn down on request.
    Cancelled,
}

impl SessionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }

    /// Whether the session can accept client input.
    pub fn accepts_input(&self) -> bool {
        matches!(self, Self::Running | Self::AwaitingInput)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::AwaitingInput => write!(f, "awaiting_input"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a session reached its terminal state.
#[derive(Debug, Clone)]
pub enum EndReason {
    /// The program ran to the end of its output stream.
    Completed,
    /// Provisioning, start, or a stream failed; carries the reported message.
    Failed(String),
    /// The execution budget elapsed.
    TimedOut(Duration),
    /// Explicit teardown (client stop or server shutdown).
    Cancelled,
}

impl EndReason {
    /// Terminal state this reason maps to.
    pub fn state(&self) -> SessionState {
        match self {
            Self::Completed => SessionState::Completed,
            Self::Failed(_) => SessionState::Failed,
            Self::TimedOut(_) => SessionState::TimedOut,
            Self::Cancelled => SessionState::Cancelled,
        }
    }

    /// Whether teardown should skip the graceful stop and kill outright.
    /// A hung or runaway process must not be waited on.
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// The single terminal event delivered to the subscriber: exactly one of
    /// `execution_complete` or `error` per session, never both.
    pub fn terminal_event(&self) -> SessionEvent {
        match self {
            Self::Completed => SessionEvent::ExecutionComplete,
            Self::Failed(message) => SessionEvent::Error {
                message: message.clone(),
            },
            Self::TimedOut(budget) => SessionEvent::Error {
                message: format!("execution timed out (max {} seconds)", budget.as_secs()),
            },
            Self::Cancelled => SessionEvent::Error {
                message: "execution cancelled".into(),
            },
        }
    }
}

/// In-memory record for one execution run.
///
/// Owned by the registry behind a per-session mutex; that mutex is the
/// single-writer discipline for every state transition.
pub(crate) struct Session {
    pub(crate) id: SessionId,
    pub(crate) state: SessionState,
    /// Exclusively owned sandbox; released exactly once during cleanup.
    pub(crate) instance: Option<Box<dyn SandboxInstance>>,
    /// Write end of the sandbox's stdin; present only while started.
    pub(crate) input: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    /// Transport endpoint currently receiving this session's events.
    /// At most one at a time; replaceable without losing the sandbox.
    pub(crate) subscriber: Option<EventSink>,
    /// Deadline timer task; aborted on any terminal transition.
    pub(crate) deadline: Option<JoinHandle<()>>,
    /// Sliding window over recent output for prompt detection.
    pub(crate) prompt: PromptDetector,
    pub(crate) created_at: DateTime<Utc>,
}

impl Session {
    /// Allocate a fresh session record in `Created` with no sandbox.
    pub(crate) fn placeholder(id: SessionId, prompt_window: usize) -> Self {
        Self {
            id,
            state: SessionState::Created,
            instance: None,
            input: None,
            subscriber: None,
            deadline: None,
            prompt: PromptDetector::new(prompt_window),
            created_at: Utc::now(),
        }
    }

    /// Claim the terminal transition. Returns true for the first claimant
    /// only; the compare-and-set here is the cleanup guard, so destructive
    /// teardown can never run twice.
    pub(crate) fn claim_terminal(&mut self, reason: &EndReason) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = reason.state();
        true
    }

    /// Deliver an event to the current subscriber, if any. Best-effort:
    /// with no subscriber attached the event is dropped.
    pub(crate) fn emit(&self, event: SessionEvent) {
        match &self.subscriber {
            Some(sink) => sink.send(event),
            None => tracing::trace!(session_id = %self.id, "No subscriber, event dropped"),
        }
    }
}
