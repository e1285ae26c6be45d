use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use quad_types::events::GatewayCommand;

use crate::engine::DeliveryEngine;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive a single WebSocket connection. Connections start anonymous;
/// an Identify command binds them to a member identity, and every send
/// command carries its own token.
pub async fn handle_connection(socket: WebSocket, engine: DeliveryEngine) {
    let (mut sender, mut receiver) = socket.split();

    let dispatcher = engine.dispatcher().clone();
    let (conn_id, mut event_rx) = dispatcher.register();
    info!("connection {} opened", conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward registry events -> client, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = event_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client.
    let engine_recv = engine.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&engine_recv, conn_id, cmd).await,
                    Err(e) => {
                        let preview: String = text.chars().take(200).collect();
                        warn!("connection {} bad command: {} -- raw: {}", conn_id, e, preview);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(conn_id);
    info!("connection {} closed", conn_id);
}

async fn handle_command(engine: &DeliveryEngine, conn_id: uuid::Uuid, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::Identify { token } => {
            engine.identify(conn_id, &token).await;
        }

        GatewayCommand::JoinRoom { faculty } => {
            debug!("connection {} joining room '{}'", conn_id, faculty);
            engine.dispatcher().join_room(conn_id, &faculty);
        }

        GatewayCommand::SendGroupMessage {
            token,
            faculty,
            content,
        } => {
            engine.send_group(&token, &faculty, &content).await;
        }

        GatewayCommand::SendPrivateMessage {
            token,
            receiver_id,
            content,
        } => {
            engine.send_private(&token, receiver_id, &content).await;
        }
    }
}
