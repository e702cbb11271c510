//! Session registry: the single owner of session state.
//!
//! Every mutation serializes through the per-session mutex, which is the
//! one-exclusive-writer discipline the state machine relies on. The outer
//! map lock is held only to insert, look up, or remove entries — never
//! across a state transition or an await on the sandbox.
//!
//! Registry mutations on an unknown session id are reported no-ops, never
//! fatal: sessions legitimately vanish mid-flight when a concurrent trigger
//! wins the terminal transition.

use crate::cleanup;
use crate::config::CoreConfig;
use crate::demux::{self, StreamItem};
use crate::error::{CoreError, Result};
use crate::provider::SandboxProvider;
use crate::relay::{EventSink, SessionEvent};
use crate::session::{EndReason, Session, SessionId, SessionState};
use crate::timeout;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex, RwLock};

/// Owns the mapping from session id to session state and coordinates the
/// sandbox provider, stream demultiplexer, prompt heuristic, deadline
/// timer, and cleanup for every session.
///
/// Cheap to clone; all clones share the same session table. Constructing
/// separate registries yields fully independent session spaces.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Box<dyn SandboxProvider>,
    config: CoreConfig,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    /// Create a registry over the given sandbox provider.
    pub fn new(provider: impl SandboxProvider + 'static, config: CoreConfig) -> Self {
        tracing::info!(
            budget_secs = config.execution_budget.as_secs(),
            max_sessions = config.max_sessions,
            "Creating session registry"
        );
        Self {
            inner: Arc::new(Inner {
                provider: Box::new(provider),
                config,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Allocate a session for the given source and provision its sandbox.
    ///
    /// Reuses a subscriber placeholder registered under the same id. On
    /// provisioning failure the session is finalized immediately (one
    /// `error` event, full cleanup) — no dangling entries, no retry.
    pub async fn create(&self, id: SessionId, source: &str) -> Result<()> {
        let max_bytes = self.inner.config.max_source_bytes;
        if source.len() > max_bytes {
            return Err(CoreError::Rejected(format!(
                "source exceeds {max_bytes} bytes"
            )));
        }

        let entry = {
            let mut sessions = self.inner.sessions.write().await;
            let cap = self.inner.config.max_sessions;
            if cap > 0 && sessions.len() >= cap && !sessions.contains_key(&id) {
                return Err(CoreError::Rejected(format!(
                    "session limit reached ({cap})"
                )));
            }
            Arc::clone(sessions.entry(id).or_insert_with(|| {
                Arc::new(Mutex::new(Session::placeholder(
                    id,
                    self.inner.config.prompt_window,
                )))
            }))
        };

        {
            let mut session = entry.lock().await;
            if session.state != SessionState::Created || session.instance.is_some() {
                return Err(CoreError::AlreadyExists(id));
            }
            // Claims the slot; a racing create for the same id now fails.
            session.state = SessionState::Starting;
        }

        tracing::info!(session_id = %id, source_bytes = source.len(), "Provisioning sandbox");
        match self.inner.provider.provision(source).await {
            Ok(instance) => {
                let mut session = entry.lock().await;
                if session.state != SessionState::Starting {
                    // The session ended while we were provisioning; release
                    // the orphaned sandbox instead of installing it.
                    drop(session);
                    let mut instance = instance;
                    if let Err(e) = instance.destroy().await {
                        tracing::warn!(session_id = %id, error = %e, "Orphan destroy failed");
                    }
                    if let Err(e) = instance.remove_artifact().await {
                        tracing::warn!(session_id = %id, error = %e, "Orphan artifact removal failed");
                    }
                    return Err(CoreError::NotFound(id));
                }
                session.instance = Some(instance);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Provisioning failed");
                self.end_session(id, EndReason::Failed(format!("failed to execute code: {e}")))
                    .await;
                Err(e)
            }
        }
    }

    /// Start a provisioned session: spawn the sandbox, wire its streams
    /// through the demultiplexer, arm the deadline, transition to running.
    pub async fn start(&self, id: SessionId) -> Result<()> {
        let entry = self.get(id).await?;
        let mut session = entry.lock().await;

        if session.state != SessionState::Starting {
            return Err(CoreError::Start(format!(
                "session is {}, not starting",
                session.state
            )));
        }
        let Some(instance) = session.instance.as_mut() else {
            return Err(CoreError::Start("session has no sandbox".into()));
        };

        let raw = match instance.start().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Sandbox start failed");
                drop(session);
                self.end_session(id, EndReason::Failed(format!("failed to execute code: {e}")))
                    .await;
                return Err(e);
            }
        };

        let streams = demux::spawn(raw.combined);
        session.input = Some(raw.input);
        session.deadline = Some(timeout::arm(
            self.clone(),
            id,
            self.inner.config.execution_budget,
        ));
        session.state = SessionState::Running;
        drop(session);

        tokio::spawn(self.clone().output_loop(id, streams.output));
        tokio::spawn(self.clone().error_loop(id, streams.errors));

        tracing::info!(session_id = %id, "Session running");
        Ok(())
    }

    /// Create and start in one step. On error the session has already been
    /// finalized and the failure reported to any attached subscriber.
    pub async fn launch(&self, id: SessionId, source: &str) -> Result<()> {
        self.create(id, source).await?;
        self.start(id).await
    }

    /// Bind (or rebind) the transport endpoint receiving this session's
    /// events. Registers a placeholder when the session does not exist yet,
    /// so a race between subscription and creation cannot drop events.
    pub async fn attach_subscriber(&self, id: SessionId, sink: EventSink) {
        let entry = {
            let mut sessions = self.inner.sessions.write().await;
            Arc::clone(sessions.entry(id).or_insert_with(|| {
                Arc::new(Mutex::new(Session::placeholder(
                    id,
                    self.inner.config.prompt_window,
                )))
            }))
        };
        let mut session = entry.lock().await;
        let replacing = session.subscriber.is_some();
        session.subscriber = Some(sink);
        tracing::debug!(session_id = %id, replacing, "Subscriber attached");
    }

    /// Detach the current subscriber.
    ///
    /// Detach-only policy: the sandbox keeps running under its deadline and
    /// a later subscriber can rejoin. A bare placeholder (nothing launched)
    /// is removed instead — there is no run to rejoin.
    pub async fn detach_subscriber(&self, id: SessionId) {
        let Ok(entry) = self.get(id).await else {
            return;
        };
        let mut session = entry.lock().await;
        session.subscriber = None;
        let placeholder = session.state == SessionState::Created && session.instance.is_none();
        drop(session);
        tracing::debug!(session_id = %id, "Subscriber detached");

        if placeholder {
            self.end_session(id, EndReason::Cancelled).await;
        }
    }

    /// Forward one line of client input to the sandbox's stdin.
    ///
    /// Valid only while the session accepts input; everything else is an
    /// `InputRejected` that leaves the session untouched. Transitions
    /// `AwaitingInput` back to `Running`.
    pub async fn submit_input(&self, id: SessionId, text: &str) -> Result<()> {
        let entry = self.get(id).await?;
        let mut session = entry.lock().await;

        if !session.state.accepts_input() {
            return Err(CoreError::InputRejected(id));
        }
        let Some(input) = session.input.as_mut() else {
            return Err(CoreError::InputRejected(id));
        };

        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');

        if let Err(e) = input.write_all(&line).await {
            tracing::warn!(session_id = %id, error = %e, "Input write failed");
            return Err(CoreError::InputRejected(id));
        }
        if let Err(e) = input.flush().await {
            tracing::warn!(session_id = %id, error = %e, "Input flush failed");
            return Err(CoreError::InputRejected(id));
        }

        if session.state == SessionState::AwaitingInput {
            session.state = SessionState::Running;
        }
        tracing::debug!(session_id = %id, bytes = line.len(), "Input forwarded");
        Ok(())
    }

    /// Terminal transition plus cleanup, from any trigger: stream end,
    /// stream failure, timeout, cancellation, or a startup error.
    ///
    /// Only the first claimant performs the destructive steps and emits the
    /// single terminal event; later invocations (and unknown ids) are
    /// no-ops. The registry entry is removed last, after the sandbox is
    /// confirmed down and its artifact deleted.
    pub async fn end_session(&self, id: SessionId, reason: EndReason) {
        let Ok(entry) = self.get(id).await else {
            tracing::debug!(session_id = %id, "End of unknown session ignored");
            return;
        };

        let mut session = entry.lock().await;
        if !session.claim_terminal(&reason) {
            return;
        }
        session.emit(reason.terminal_event());
        cleanup::run(&mut session, reason.is_hard()).await;
        let outcome = session.state;
        let age_ms = (Utc::now() - session.created_at).num_milliseconds();
        drop(session);

        self.inner.sessions.write().await.remove(&id);
        tracing::info!(session_id = %id, outcome = %outcome, age_ms, "Session finalized");
    }

    /// Tear down every live session (used on server shutdown).
    pub async fn shutdown_all(&self) {
        let ids: Vec<SessionId> = {
            let sessions = self.inner.sessions.read().await;
            sessions.keys().copied().collect()
        };
        let count = ids.len();
        if count > 0 {
            tracing::info!(count, "Cancelling all sessions");
        }
        for id in ids {
            self.end_session(id, EndReason::Cancelled).await;
        }
    }

    /// Current state of a session, if it exists.
    pub async fn state(&self, id: SessionId) -> Option<SessionState> {
        let entry = self.get(id).await.ok()?;
        let session = entry.lock().await;
        Some(session.state)
    }

    /// Number of live sessions (placeholders included).
    pub async fn count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    /// List all live session IDs.
    pub async fn list(&self) -> Vec<SessionId> {
        self.inner.sessions.read().await.keys().copied().collect()
    }

    async fn get(&self, id: SessionId) -> Result<Arc<Mutex<Session>>> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound(id))
    }

    /// Consume the demultiplexed output stream: relay each chunk, run the
    /// prompt heuristic, and finalize the session when the stream ends.
    async fn output_loop(self, id: SessionId, mut rx: mpsc::UnboundedReceiver<StreamItem>) {
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => {
                    let Ok(entry) = self.get(id).await else {
                        return;
                    };
                    let mut session = entry.lock().await;
                    if session.state.is_terminal() {
                        continue;
                    }
                    let prompt = session.prompt.push_chunk(&chunk);
                    session.emit(SessionEvent::Output {
                        data: String::from_utf8_lossy(&chunk).into_owned(),
                    });
                    if prompt && session.state == SessionState::Running {
                        session.state = SessionState::AwaitingInput;
                        session.emit(SessionEvent::InputRequired);
                        tracing::debug!(session_id = %id, "Prompt detected, awaiting input");
                    }
                }
                Err(e) => {
                    self.end_session(id, EndReason::Failed(format!("stream error: {e}")))
                        .await;
                    return;
                }
            }
        }
        // Clean end of the output stream: the program is done.
        self.end_session(id, EndReason::Completed).await;
    }

    /// Consume the demultiplexed error stream, relaying chunks as
    /// non-terminal `error` events.
    async fn error_loop(self, id: SessionId, mut rx: mpsc::UnboundedReceiver<StreamItem>) {
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => {
                    let Ok(entry) = self.get(id).await else {
                        return;
                    };
                    let session = entry.lock().await;
                    if !session.state.is_terminal() {
                        session.emit(SessionEvent::Error {
                            message: String::from_utf8_lossy(&chunk).into_owned(),
                        });
                    }
                }
                Err(e) => {
                    self.end_session(id, EndReason::Failed(format!("stream error: {e}")))
                        .await;
                    return;
                }
            }
        }
    }
}
