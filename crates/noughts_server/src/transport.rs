//! WebSocket transport: one task pair per connection feeding the gateway.

use crate::gateway::Gateway;
use crate::protocol::ServerEvent;
use crate::session::ParticipantId;
use crate::{ErrorKind, GameError};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Upgrades `GET /ws` to a WebSocket and assigns the connection a fresh
/// participant id.
pub async fn ws_handler(
    State(gateway): State<Gateway>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let participant = ParticipantId::new();
    debug!(%participant, "WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(gateway, participant, socket))
}

#[instrument(skip(gateway, socket))]
async fn handle_socket(gateway: Gateway, participant: ParticipantId, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut events) = mpsc::unbounded_channel::<ServerEvent>();

    // Forward gateway events to the socket until the outbox is dropped.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                debug!("Socket closed while sending");
                break;
            }
        }
        let _ = sink.close().await;
    });

    gateway.connect(participant, outbox);

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                // Rejections have already been sent to the participant.
                let _ = gateway.handle_text(participant, text.as_str());
            }
            Ok(Message::Binary(_)) => {
                gateway.reject(
                    participant,
                    &GameError::new(ErrorKind::MalformedPayload, "Binary frames are not supported"),
                );
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                warn!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    info!("WebSocket closed");
    gateway.disconnect(participant);
}
