//! WebSocket handler for subscriber connections.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};

use crate::api::AppState;

use super::hub::WsHub;

/// WebSocket upgrade handler.
///
/// GET /ws
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_ws_connection(socket, hub))
}

/// Handle one subscriber connection until it closes.
async fn handle_ws_connection(socket: WebSocket, hub: Arc<WsHub>) {
    let (mut sender, mut receiver) = socket.split();

    // Register with the hub; broadcasts start landing in our queue now.
    let (mut queue, conn_id) = hub.accept();

    // Writer task: drain the per-connection queue onto the socket. A send
    // error means the transport is gone and the reader loop will see it too.
    let send_task = tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(err) => {
                    warn!("Failed to serialize outgoing message: {err}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
        // Queue closed (hub shutdown or prune): tell the client to go.
        let _ = sender.send(Message::Close(None)).await;
    });

    // Reader loop: client frames are echoed back through the same queue,
    // which keeps them ordered with broadcasts to this connection.
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                hub.send_to(conn_id, super::types::ServerMessage::echo(text.to_string()));
            }
            Ok(Message::Binary(_)) => {
                debug!("Ignoring binary frame on connection {conn_id}");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Protocol-level keepalive, answered by axum.
            }
            Ok(Message::Close(_)) => {
                info!("Connection {conn_id} closed by client");
                break;
            }
            Err(err) => {
                warn!("WebSocket error on connection {conn_id}: {err}");
                break;
            }
        }
    }

    send_task.abort();
    hub.remove(conn_id);
}
