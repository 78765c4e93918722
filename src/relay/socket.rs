//! WebSocket transport for the relay
//!
//! Each connection gets a writer task draining its outbound queue into the
//! socket, so frames from one sender arrive in the order they were queued.
//! The reader decodes text frames and hands them to the relay.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use super::{ClientMessage, ConnectionId, Relay};
use crate::error::protocol_violation;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(relay): State<Relay>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_connection(socket, relay))
}

async fn serve_connection(socket: WebSocket, relay: Relay) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut queue) = mpsc::unbounded_channel();
    let id = relay.connect(outbox);

    let writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            let text = match frame.encode() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(connection = id, "Failed to encode frame: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break; // Client disconnected
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => dispatch(&relay, id, &text),
            Message::Close(_) => break,
            Message::Binary(_) => {
                tracing::debug!(connection = id, "Ignoring binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    relay.disconnect(id);
    writer.abort();
}

/// Decode one text frame and apply it; failures are logged and the frame dropped
fn dispatch(relay: &Relay, id: ConnectionId, text: &str) {
    let result = ClientMessage::decode(text)
        .map_err(|e| protocol_violation(id, format!("undecodable frame ({e})")))
        .and_then(|message| relay.handle(id, message));
    if let Err(e) = result {
        tracing::warn!(connection = id, "Dropping frame: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_survives_garbage_and_applies_frames() {
        let relay = Relay::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = relay.connect(tx);

        dispatch(&relay, id, "garbage");
        dispatch(&relay, id, r#"{"event":"join","data":"clock"}"#);
        assert!(relay.members("clock").connections.is_empty());

        dispatch(
            &relay,
            id,
            r#"{"event":"hello","data":{"bundle":"clock","name":"control","type":"panel"}}"#,
        );
        assert_eq!(relay.members("clock").connections, vec![id]);
        assert_eq!(relay.stats().introduced, 1);
    }
}
