//! # kiln-runtime
//!
//! Ephemeral, resource-limited runtime for one piece of submitted code.
//!
//! A [`ProcessRuntime`] owns a single interpreter process over a single
//! source file in a private scratch directory. Once started it exposes a
//! stdin handle and one *combined* byte channel that interleaves framed
//! stdout/stderr (see [`frame`]); splitting the combined channel back into
//! independent streams is the consumer's job.
//!
//! Lifecycle: `provision` (write the source, no process yet) → `start`
//! (spawn with caps applied, obtain I/O handles) → `stop` (SIGTERM, grace
//! window, then escalate) or `kill` (SIGKILL). `stop` and `kill` are
//! idempotent; the scratch directory survives until `remove_artifact`.

mod config;
mod error;
pub mod frame;
mod limits;
mod runtime;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::{Result, RuntimeError};
pub use limits::ResourceLimits;
pub use runtime::{ProcessRuntime, RuntimeIo, RuntimeState};
