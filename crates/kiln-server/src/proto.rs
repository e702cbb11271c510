//! Wire messages for the gateway.
//!
//! Session events ([`kiln_core::SessionEvent`]) are serialized onto the
//! WebSocket as-is; the types here cover the remaining traffic: client
//! commands, acknowledgements, and the HTTP DTOs. Events carry no session
//! id — they flow to whichever socket is subscribed to that session, so a
//! client driving one run per socket needs no correlation.

use serde::{Deserialize, Serialize};

/// Commands a client sends over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit code and start a new session on this socket.
    Execute {
        code: String,
        #[serde(default)]
        language: Option<String>,
    },
    /// (Re)subscribe this socket to an existing session.
    Join { session_id: String },
    /// Send one line of input to a session.
    Input { session_id: String, input: String },
}

/// Acknowledgement sent after an `execute` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    SessionCreated { session_id: String },
}

/// Body of `POST /api/execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Response of `POST /api/execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResponse {
    pub session_id: String,
    pub message: String,
}

/// Check a submission's shape before provisioning anything.
///
/// Only one runtime is wired, so `language` must be python when present.
pub fn validate_submission(code: &str, language: Option<&str>) -> Result<(), &'static str> {
    if code.trim().is_empty() {
        return Err("no code provided");
    }
    match language {
        None | Some("python") => Ok(()),
        Some(_) => Err("only python is supported at this time"),
    }
}
