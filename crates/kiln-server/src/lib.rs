//! # kiln-server
//!
//! Network-facing gateway for kiln execution sessions.
//!
//! Two client surfaces over one axum router:
//!
//! - `POST /api/execute` — validate a submission, hand back a session id,
//!   launch the run in the background.
//! - `GET /ws` — the event protocol: `execute`/`join`/`input` inbound,
//!   session events outbound.
//!
//! The gateway owns no session state; everything goes through the
//! [`kiln_core::SessionRegistry`].

pub mod config;
pub mod proto;
pub mod routes;
pub mod ws;

pub use config::ServerConfig;
pub use routes::{build_router, AppState};
