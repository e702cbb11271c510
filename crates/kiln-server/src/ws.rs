//! WebSocket event protocol.
//!
//! One socket can drive any number of sessions, though clients typically
//! run one. For `execute` the subscriber is attached *before* the launch so
//! no early event can be dropped. Closing the socket only detaches its
//! subscriptions — sandboxes keep running under their deadlines and can be
//! rejoined from a new socket.

use crate::proto::{validate_submission, ClientMessage, ServerMessage};
use crate::routes::AppState;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use kiln_core::{EventSink, SessionEvent, SessionId};
use uuid::Uuid;

/// Drive one WebSocket connection until it closes.
pub async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (sink, mut events) = EventSink::channel();
    let mut joined: Vec<SessionId> = Vec::new();

    tracing::debug!("WebSocket connected");

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "Event serialization failed");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_message(&state, &sink, &mut joined, &mut ws_tx, &text).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong handled by axum; binary ignored
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket error");
                    break;
                }
            }
        }
    }

    // Detach-only: the sessions this socket was watching stay alive.
    for id in joined {
        state.registry.detach_subscriber(id).await;
    }
    tracing::debug!("WebSocket disconnected");
}

async fn handle_message(
    state: &AppState,
    sink: &EventSink,
    joined: &mut Vec<SessionId>,
    ws_tx: &mut (impl SinkExt<Message> + Unpin),
    text: &str,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed client message");
            sink.send(SessionEvent::Error {
                message: "malformed message".into(),
            });
            return;
        }
    };

    match message {
        ClientMessage::Execute { code, language } => {
            if let Err(reason) = validate_submission(&code, language.as_deref()) {
                sink.send(SessionEvent::Error {
                    message: reason.into(),
                });
                return;
            }

            let id = SessionId::new();
            joined.push(id);
            // Attach first so no event between launch and subscribe is lost.
            state.registry.attach_subscriber(id, sink.clone()).await;

            let ack = ServerMessage::SessionCreated {
                session_id: id.to_string(),
            };
            if let Ok(payload) = serde_json::to_string(&ack) {
                let _ = ws_tx.send(Message::Text(payload)).await;
            }

            let registry = state.registry.clone();
            tokio::spawn(async move {
                if let Err(e) = registry.launch(id, &code).await {
                    // Already finalized and reported through the session.
                    tracing::warn!(session_id = %id, error = %e, "Launch failed");
                }
            });
            tracing::info!(session_id = %id, "Execution requested via WebSocket");
        }
        ClientMessage::Join { session_id } => {
            let Some(id) = parse_session_id(&session_id) else {
                sink.send(SessionEvent::Error {
                    message: "invalid session id".into(),
                });
                return;
            };
            joined.push(id);
            state.registry.attach_subscriber(id, sink.clone()).await;
            tracing::debug!(session_id = %id, "Socket joined session");
        }
        ClientMessage::Input { session_id, input } => {
            let Some(id) = parse_session_id(&session_id) else {
                sink.send(SessionEvent::Error {
                    message: "invalid session id".into(),
                });
                return;
            };
            // InputRejected is non-fatal: report it, change nothing.
            if let Err(e) = state.registry.submit_input(id, &input).await {
                tracing::debug!(session_id = %id, error = %e, "Input rejected");
                sink.send(SessionEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }
}

fn parse_session_id(raw: &str) -> Option<SessionId> {
    Uuid::parse_str(raw).ok().map(SessionId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_id() {
        let id = SessionId::new();
        assert_eq!(parse_session_id(&id.to_string()), Some(id));
        assert_eq!(parse_session_id("not-a-uuid"), None);
    }
}
