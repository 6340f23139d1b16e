//! WebSocket transcription endpoint
//!
//! Binary frames carry raw PCM audio (16 kHz mono s16le). An empty binary
//! frame or a close frame ends the utterance; the buffered audio is then
//! transcribed in one shot and the result sent back as JSON.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use futures::SinkExt;
use axum::extract::State;
use axum::response::Response;
use serde_json::json;
use tracing::{debug, warn};

use super::ServerState;

fn ws_text(msg: String) -> Message {
    Message::Text(msg.into())
}

pub async fn transcribe_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_transcribe(socket, state))
}

async fn handle_transcribe(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut audio: Vec<u8> = Vec::new();

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Binary(data)) => {
                if data.is_empty() {
                    break;
                }
                audio.extend_from_slice(&data);
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {} // text/ping/pong frames are ignored
        }
    }

    debug!(bytes = audio.len(), "transcribing buffered websocket audio");

    match state.stt.transcribe_pcm(&audio).await {
        Ok(text) => {
            let payload = json!({"type": "transcription", "text": text}).to_string();
            if socket.send(ws_text(payload)).await.is_err() {
                return;
            }
            let _ = socket
                .send(ws_text(json!({"type": "end"}).to_string()))
                .await;
        }
        Err(e) => {
            warn!("websocket transcription failed: {e}");
            let payload = json!({"type": "error", "message": e.to_string()}).to_string();
            let _ = socket.send(ws_text(payload)).await;
        }
    }

    let _ = socket.close().await;
}
