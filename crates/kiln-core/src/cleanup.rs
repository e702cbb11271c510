//! Idempotent session teardown.
//!
//! Runs only in the first claimant of the terminal transition (see
//! [`crate::session::Session::claim_terminal`]), so the destructive steps
//! execute at most once no matter how many triggers race. Each step
//! tolerates failure of the previous one: errors are logged and never
//! returned, so teardown always runs to the end and the registry cannot
//! leak an entry. Removing the registry entry itself is the caller's final
//! step, after the sandbox is confirmed down.

use crate::session::Session;

/// Tear down a session's resources in order: disarm the deadline, close
/// stdin, stop the sandbox (graceful unless `hard`), force-destroy it, and
/// delete the run's temporary artifact.
pub(crate) async fn run(session: &mut Session, hard: bool) {
    let id = session.id;

    if let Some(timer) = session.deadline.take() {
        timer.abort();
    }

    // Closing our end of stdin lets a program blocked on read see EOF
    // before any signal arrives.
    session.input = None;

    let Some(instance) = session.instance.as_mut() else {
        tracing::debug!(session_id = %id, "No sandbox to tear down");
        return;
    };

    if !hard && instance.is_running().await {
        if let Err(e) = instance.stop().await {
            tracing::warn!(session_id = %id, error = %e, "Graceful stop failed");
        }
    }

    if let Err(e) = instance.destroy().await {
        tracing::warn!(session_id = %id, error = %e, "Sandbox destroy failed");
    }

    if let Err(e) = instance.remove_artifact().await {
        tracing::warn!(session_id = %id, error = %e, "Artifact removal failed");
    }

    session.instance = None;
    tracing::debug!(session_id = %id, "Session resources released");
}
