//! Realtime WebSocket endpoint.
//!
//! GET /ws
//!
//! Protocol:
//! - Server → client: envelopes `{type, data?, status?, timestamp}`. The first
//!   one is `status: connected` carrying the connection id, which the client
//!   may echo in `X-Connection-Id` on HTTP writes.
//! - Client → server: nothing is required; malformed text gets an `error`
//!   envelope back.
//! - The server pings every heartbeat interval and drops the connection if
//!   the previous ping went unanswered.

use std::sync::Arc;

use axum::extract::Extension;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};

use pourline_events::Envelope;
use pourline_infra::realtime::{ConnectionEvent, ConnectionState, Heartbeat, HeartbeatAction};

use crate::app::services::AppServices;

pub async fn ws_upgrade(
    Extension(services): Extension<Arc<AppServices>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| realtime_session(socket, services))
}

async fn realtime_session(socket: WebSocket, services: Arc<AppServices>) {
    let (mut sink, mut stream) = socket.split();
    let (connection_id, mut outbound) = services.realtime.connect();
    let mut state = ConnectionState::default();
    let mut heartbeat = Heartbeat::new();

    let greeting = Envelope::status(
        "connected",
        Some(serde_json::json!({ "connectionId": connection_id })),
        Utc::now(),
    );
    if send_envelope(&mut sink, &greeting).await.is_err() {
        services.realtime.disconnect(connection_id);
        return;
    }
    state = state.on(ConnectionEvent::Opened);
    tracing::info!(%connection_id, "realtime connection opened");

    let mut ping_interval = tokio::time::interval(services.heartbeat_interval);
    ping_interval.tick().await; // skip immediate

    while state.is_open() {
        tokio::select! {
            _ = ping_interval.tick() => {
                match heartbeat.on_tick() {
                    HeartbeatAction::SendPing => {
                        if sink.send(Message::Ping(Vec::new())).await.is_err() {
                            state = state.on(ConnectionEvent::TransportClosed);
                        }
                    }
                    HeartbeatAction::Terminate => {
                        tracing::info!(%connection_id, "no pong since last ping, terminating dead connection");
                        state = state.on(ConnectionEvent::CloseRequested);
                    }
                }
            }

            queued = outbound.recv() => {
                match queued {
                    Some(text) => {
                        if sink.send(Message::Text(text.to_string())).await.is_err() {
                            state = state.on(ConnectionEvent::TransportClosed);
                        }
                    }
                    // Dropped from the registry by a failed broadcast.
                    None => state = state.on(ConnectionEvent::CloseRequested),
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Pong(_))) => heartbeat.on_pong(),
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = Envelope::from_json(&text) {
                            tracing::debug!(%connection_id, error = %e, "unrecognized client message");
                            // Queued behind pending broadcasts so replies keep their order.
                            let reply = Envelope::error("unrecognized message", Utc::now());
                            if !services.realtime.send_to(connection_id, &reply) {
                                state = state.on(ConnectionEvent::CloseRequested);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => state = state.on(ConnectionEvent::CloseRequested),
                    Some(Err(_)) | None => state = state.on(ConnectionEvent::TransportClosed),
                    _ => {}
                }
            }
        }
    }

    services.realtime.disconnect(connection_id);
    if state == ConnectionState::Closing {
        let _ = sink.close().await;
    }
    state = state.on(ConnectionEvent::TransportClosed);
    tracing::info!(%connection_id, ?state, "realtime connection closed");
}

async fn send_envelope<S>(sink: &mut S, envelope: &Envelope) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = envelope.to_json().map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
