//! # kiln-core
//!
//! Sandboxed execution session manager.
//!
//! One session is one client-visible run: source code goes into an
//! isolated, resource-capped sandbox; its byte streams are multiplexed onto
//! a persistent client connection; a heuristic flags when the program is
//! blocked on interactive input; a hard deadline bounds execution; and
//! every resource is torn down exactly once no matter how the run ends.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     SessionRegistry                        │
//! │                                                            │
//! │  gateway ──create/start──▶ HashMap<SessionId, Session>     │
//! │  client  ──input/attach──▶        │                        │
//! │                                   ▼                        │
//! │        SandboxProvider ──▶ SandboxInstance (one per run)   │
//! │                                   │ combined (framed)      │
//! │                                   ▼                        │
//! │                            demux ─┬─▶ stdout ─▶ prompt ─┐  │
//! │                                   └─▶ stderr ──────────┐│  │
//! │                                                        ▼▼  │
//! │  deadline timer ──▶ end_session ◀── stream end     EventSink
//! │                        │                            (relay) │
//! │                        ▼                                    │
//! │                 cleanup (exactly once)                      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The deadline timer, both stream loops, an explicit cancel, and startup
//! failures all converge on [`SessionRegistry::end_session`]; a
//! compare-and-set on the session state lets only the first of them run the
//! destructive teardown and emit the session's single terminal event.

mod cleanup;
mod config;
mod demux;
mod error;
mod prompt;
mod provider;
mod registry;
mod relay;
mod session;
mod timeout;

pub use config::{
    CoreConfig, DEFAULT_EXECUTION_BUDGET, DEFAULT_MAX_SOURCE_BYTES, DEFAULT_PROMPT_WINDOW,
};
pub use error::{CoreError, Result};
pub use provider::{ProcessProvider, RawIo, SandboxInstance, SandboxProvider};
pub use registry::SessionRegistry;
pub use relay::{EventSink, SessionEvent};
pub use session::{EndReason, SessionId, SessionState};
