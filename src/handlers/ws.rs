use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Current snapshot first, then every published one until either side closes.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (current, mut updates) = state.push.subscribe();
    tracing::info!("📡 Push subscriber connected ({} total)", state.push.subscriber_count());

    if socket.send(Message::Text(current.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    if socket.send(Message::Text(snapshot.to_string())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Push subscriber lagged, {} snapshots skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::info!("📴 Push subscriber disconnected");
}
