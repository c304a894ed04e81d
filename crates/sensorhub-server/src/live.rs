use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::broadcast::{BroadcastRegistry, ConnectionId};
use crate::server::AppState;

/// `GET /ws`: upgrade and attach the socket to the broadcast registry.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry))
}

async fn handle_socket(socket: WebSocket, registry: Arc<BroadcastRegistry>) {
    let (conn_id, rx) = registry.connect();
    tracing::info!(conn_id = %conn_id, "live client connected");

    run_connection(socket, &conn_id, rx).await;

    registry.unregister(&conn_id);
    tracing::info!(conn_id = %conn_id, "live client disconnected");
}

/// Pump queued events to the socket until either direction ends.
///
/// Inbound frames are read only to notice the close; their content is ignored.
async fn run_connection(socket: WebSocket, conn_id: &ConnectionId, mut rx: mpsc::Receiver<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader_id = conn_id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    tracing::debug!(conn_id = %reader_id, %error, "live socket read failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
}
