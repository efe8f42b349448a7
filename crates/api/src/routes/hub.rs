//! WebSocket hub endpoint.
//!
//! Browser clients connect to `/airqualityhub` and receive every newly
//! stored reading as a `{"event": ..., "data": ...}` text frame. The
//! connection is broadcast-only; inbound frames other than close are
//! ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::services::EventHub;

/// GET /airqualityhub
pub async fn hub_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub.clone()))
}

async fn handle_socket(socket: WebSocket, hub: EventHub) {
    let (mut sink, mut stream) = socket.split();
    let mut events = hub.subscribe();

    debug!("Hub client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "Skipping unserializable hub frame");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Slow consumer; drop the backlog rather than the socket
                    warn!(skipped = skipped, "Hub client lagged");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "Hub client socket error");
                    break;
                }
            },
        }
    }

    debug!("Hub client disconnected");
}
