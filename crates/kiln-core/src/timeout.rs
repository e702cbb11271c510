//! Per-session execution deadline.
//!
//! One timer per session, armed at start with a fixed budget measured from
//! session start (no activity-based extension). Expiry forces hard teardown
//! through the same terminal path as every other trigger; the registry
//! aborts the task on any earlier terminal transition, so a stale timer can
//! never fire against a reused identifier.

use crate::registry::SessionRegistry;
use crate::session::{EndReason, SessionId};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Arm the deadline for a session. The returned handle is owned by the
/// session and aborted during cleanup.
pub(crate) fn arm(registry: SessionRegistry, id: SessionId, budget: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(budget).await;
        tracing::info!(
            session_id = %id,
            budget_secs = budget.as_secs(),
            "Execution budget exhausted"
        );
        registry.end_session(id, EndReason::TimedOut(budget)).await;
    })
}
