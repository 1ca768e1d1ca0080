//! Connection handling logic for WebSocket clients.
//!
//! This module manages the lifecycle of individual client connections:
//! WebSocket handshaking, shuttling frames to and from the session engine,
//! and cleanup.

use crate::{engine::EngineHandle, error::ServerError};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
};
use tracing::{debug, error, trace, warn};

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Register the connection with the session engine
/// 3. Start message handling tasks (incoming and outgoing)
/// 4. Tell the engine the connection is gone
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `engine` - Handle to the session engine task
///
/// # Message Handling
///
/// * **Incoming Task**: forwards text frames to the engine unparsed
/// * **Outgoing Task**: serializes the engine's replies onto the socket
///
/// Both run until the client closes, the socket errors, or the engine drops
/// the connection's outbox.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    engine: EngineHandle,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let (connection_id, mut outbox) = engine.open_connection(addr)?;
    debug!("🔗 Connection {} opened from {}", connection_id, addr);

    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    let incoming_task = {
        let engine = engine.clone();
        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if engine.inbound(connection_id, text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut ws_sender = ws_sender_incoming.lock().await;
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Ok(Message::Binary(_)) => {
                        trace!("Ignoring binary frame from connection {}", connection_id);
                    }
                    Err(e) => {
                        error!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    let outgoing_task = {
        let ws_sender = ws_sender_outgoing;
        async move {
            while let Some(message) = outbox.recv().await {
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize {}: {}", message.kind(), e);
                        continue;
                    }
                };
                let mut ws_sender = ws_sender.lock().await;
                if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                    error!("Failed to send message: {}", e);
                    return;
                }
            }

            // Outbox closed by the engine
            let mut ws_sender = ws_sender.lock().await;
            let _ = ws_sender
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Away,
                    reason: "Server shutting down".into(),
                })))
                .await;
        }
    };

    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    debug!("🔌 Connection {} from {} closed", connection_id, addr);
    // The engine may already be gone during shutdown
    let _ = engine.close_connection(connection_id);
    Ok(())
}

/// Completes the handshake only to close it again with a "server full" frame.
pub async fn refuse_connection(stream: TcpStream, addr: SocketAddr) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            debug!("Handshake with refused client {} failed: {}", addr, e);
            return;
        }
    };
    if let Err(e) = ws_stream
        .close(Some(CloseFrame {
            code: CloseCode::Again,
            reason: "Server is full".into(),
        }))
        .await
    {
        warn!("Failed to close refused connection {}: {}", addr, e);
    }
}
