//! WebSocket connection handler
//!
//! Manages one client connection: the inbound event stream, the directed
//! push channel for this session, and the all-sessions broadcast feed.
//! Lifecycle per connection is CONNECTING -> OPEN (after `userOnline`) ->
//! CLOSED, with the guarded presence cleanup on the way out.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::socket_server::presence::ConnId;
use crate::socket_server::protocol::{ClientEvent, ServerEvent};

/// Handle a single WebSocket connection
pub async fn handle_connection(stream: TcpStream, engine: Arc<Engine>) {
    let addr = stream.peer_addr().ok();
    tracing::info!("New connection from {:?}", addr);

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let mut conn = ConnectionState::new(ws_stream, engine);
    conn.run().await;

    tracing::info!("Connection closed from {:?}", addr);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Open,
    Closed,
}

/// State for a single connection
struct ConnectionState {
    ws: WebSocketStream<TcpStream>,
    engine: Arc<Engine>,
    conn_id: ConnId,
    phase: Phase,
    push_tx: mpsc::UnboundedSender<ServerEvent>,
    push_rx: mpsc::UnboundedReceiver<ServerEvent>,
    broadcast_rx: broadcast::Receiver<ServerEvent>,
}

impl ConnectionState {
    fn new(ws: WebSocketStream<TcpStream>, engine: Arc<Engine>) -> Self {
        let conn_id = format!(
            "sess_{}",
            uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
        );
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let broadcast_rx = engine.registry().subscribe();
        Self {
            ws,
            engine,
            conn_id,
            phase: Phase::Connecting,
            push_tx,
            push_rx,
            broadcast_rx,
        }
    }

    async fn run(&mut self) {
        loop {
            tokio::select! {
                // Inbound events from the client
                msg = self.ws.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.handle_event(&text).await {
                                tracing::error!("Error handling event: {}", e);
                                let _ = self
                                    .send(&ServerEvent::Error {
                                        code: "internal_error".to_string(),
                                        message: e.to_string(),
                                    })
                                    .await;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Session {} requested close", self.conn_id);
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = self.ws.send(Message::Pong(data)).await;
                        }
                        Some(Err(e)) => {
                            tracing::error!("WebSocket error: {}", e);
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }

                // Directed pushes for this session (alerts, messages, typing)
                event = self.push_rx.recv() => {
                    if let Some(event) = event {
                        if self.send(&event).await.is_err() {
                            break;
                        }
                    }
                }

                // All-sessions broadcast feed (presence, location changes)
                event = self.broadcast_rx.recv() => {
                    match event {
                        Ok(event) => {
                            if self.send(&event).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "Session {} lagged, skipped {} broadcast events",
                                self.conn_id,
                                skipped
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        self.phase = Phase::Closed;
        tracing::debug!("Session {} entered {:?}", self.conn_id, self.phase);
        // Guarded: a stale disconnect cannot clobber a newer session
        if let Some(user_id) = self.engine.close_session(&self.conn_id) {
            tracing::info!("User {} went offline ({})", user_id, self.conn_id);
        }
    }

    async fn handle_event(&mut self, text: &str) -> anyhow::Result<()> {
        let event: ClientEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!("Unparseable event from {}: {}", self.conn_id, e);
                self.send(&ServerEvent::Error {
                    code: "bad_request".to_string(),
                    message: "Unrecognized event".to_string(),
                })
                .await?;
                return Ok(());
            }
        };

        match event {
            ClientEvent::UserOnline { user_id } => {
                if self.phase == Phase::Open {
                    tracing::debug!("Session {} re-identified", self.conn_id);
                }
                self.engine
                    .open_session(&user_id, &self.conn_id, self.push_tx.clone());
                self.phase = Phase::Open;
                tracing::info!("User {} online via {}", user_id, self.conn_id);
            }

            ClientEvent::UpdateLocation {
                user_id,
                latitude,
                longitude,
                accuracy,
            } => {
                match self
                    .engine
                    .location_update(&user_id, latitude, longitude, accuracy)
                    .await
                {
                    Ok(ack) => {
                        self.send(&ServerEvent::LocationTracked {
                            success: true,
                            message: "Location updated".to_string(),
                            timestamp: ack.timestamp,
                            nearby: ack.nearby,
                        })
                        .await?;
                    }
                    Err(err) => {
                        let message = location_error_message(&err);
                        if !err.is_validation() {
                            tracing::error!("Location update failed for {}: {}", user_id, err);
                        }
                        self.send(&ServerEvent::LocationError {
                            message: message.to_string(),
                        })
                        .await?;
                    }
                }
            }

            ClientEvent::SendMessage {
                sender_id,
                recipient_id,
                content,
                encrypted_content,
            } => {
                if let Err(err) = self
                    .engine
                    .send_message(&sender_id, &recipient_id, &content, encrypted_content)
                    .await
                {
                    tracing::error!("Message from {} not stored: {}", sender_id, err);
                    self.send(&ServerEvent::Error {
                        code: err.code().to_string(),
                        message: err.to_string(),
                    })
                    .await?;
                }
            }

            ClientEvent::Typing {
                sender_id,
                recipient_id,
            } => {
                self.engine.notify_typing(&sender_id, &recipient_id, true);
            }

            ClientEvent::StopTyping {
                sender_id,
                recipient_id,
            } => {
                self.engine.notify_typing(&sender_id, &recipient_id, false);
            }

            ClientEvent::StopLocationSharing { user_id } => {
                match self.engine.stop_location_sharing(&user_id).await {
                    Ok(()) => {
                        self.send(&ServerEvent::LocationSharingToggled { enabled: false })
                            .await?;
                    }
                    Err(err) => {
                        tracing::error!("Stop sharing failed for {}: {}", user_id, err);
                        self.send(&ServerEvent::LocationError {
                            message: "Failed to stop sharing".to_string(),
                        })
                        .await?;
                    }
                }
            }

            ClientEvent::InitiateCall {
                caller_id,
                recipient_id,
            } => {
                self.engine
                    .call_offer(&caller_id, &recipient_id, &self.conn_id);
            }

            ClientEvent::AcceptCall { caller_id } => {
                self.engine.call_accept(&caller_id, &self.conn_id);
            }
        }

        Ok(())
    }

    async fn send(&mut self, event: &ServerEvent) -> anyhow::Result<()> {
        let json = serde_json::to_string(event)?;
        self.ws.send(Message::Text(json)).await?;
        Ok(())
    }
}

fn location_error_message(err: &EngineError) -> &'static str {
    match err {
        EngineError::InvalidCoordinates { .. } | EngineError::InvalidAccuracy { .. } => {
            "Invalid coordinates"
        }
        EngineError::UserNotFound { .. } => "User not found",
        _ => "Failed to update location",
    }
}
