use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query};
use axum::response::Response;
use axum::Extension;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::Connection;
use crate::engine::hilo::PlayerAction;
use crate::game::GameError;
use crate::tokio_tools::spawn_named_task;

use super::dto::{ClientMessage, ConnectQuery, ServerReply};
use super::error::ApiError;
use super::routes::ServerContext;

const LOG_TARGET: &str = "server::ws";
const OUTBOUND_CAPACITY: usize = 64;

/// `GET /tables/:table_id/ws?userID=..`. The table is checked before the
/// upgrade so unknown tables get a plain 404.
pub async fn table_ws(
    Extension(ctx): Extension<Arc<ServerContext>>,
    Path(table_id): Path<String>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    ctx.lobby.get_table(&table_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, ctx, table_id, query.user_id)))
}

async fn handle_socket(socket: WebSocket, ctx: Arc<ServerContext>, table_id: String, user_id: String) {
    let connection_id = Uuid::new_v4().to_string();
    // attach first: a registered connection without a queue reads as gone to the broadcaster
    let mut pushes = ctx.hub.attach(connection_id.as_str());
    let connection = match ctx
        .coordinator
        .connect(&table_id, &user_id, &connection_id)
        .await
    {
        Ok(connection) => connection,
        Err(err) => {
            warn!(target = LOG_TARGET, %table_id, %user_id, error = %err, "connect failed");
            ctx.hub.detach(&connection_id);
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);
    let writer = spawn_named_task(format!("ws-writer-{connection_id}"), async move {
        while let Some(message) = out_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    if let Err(err) = ctx.coordinator.resync(&connection).await {
        warn!(target = LOG_TARGET, %connection_id, error = %err, "initial state push failed");
    }

    loop {
        tokio::select! {
            push = pushes.recv() => {
                let Some(text) = push else {
                    debug!(target = LOG_TARGET, %connection_id, "push queue dropped by hub");
                    break;
                };
                if out_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Some(reply) = handle_frame(&ctx, &connection, &text).await else {
                        continue;
                    };
                    match serde_json::to_string(&reply) {
                        Ok(text) => {
                            if out_tx.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(target = LOG_TARGET, %connection_id, error = %err, "failed to encode reply");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(target = LOG_TARGET, %connection_id, error = %err, "websocket error");
                    break;
                }
            }
        }
    }

    ctx.coordinator.disconnect(&connection).await;
    ctx.hub.detach(&connection_id);
    drop(out_tx);
    let _ = writer.await;
    info!(target = LOG_TARGET, %table_id, %user_id, %connection_id, "websocket closed");
}

async fn handle_frame(
    ctx: &ServerContext,
    connection: &Connection,
    raw: &str,
) -> Option<ServerReply> {
    let frame = match serde_json::from_str::<ClientMessage>(raw) {
        Ok(frame) => frame,
        Err(err) => {
            return Some(ServerReply::Error {
                message: format!("malformed frame: {err}"),
            })
        }
    };

    let result = match frame {
        ClientMessage::Resync => ctx.coordinator.resync(connection).await.map(|()| None),
        ClientMessage::PlayerAction { action, payload } => {
            match PlayerAction::from_wire(&action, &payload) {
                Ok(action) => ctx
                    .coordinator
                    .process_player_action(&connection.table_id, &connection.user_id, action)
                    .await
                    .map(|receipt| {
                        Some(ServerReply::Ack {
                            game_seq: receipt.game_seq,
                            street: receipt.street,
                            advance: receipt.advance,
                        })
                    }),
                Err(err) => Err(GameError::from(err)),
            }
        }
    };

    result.unwrap_or_else(|err| {
        debug!(
            target = LOG_TARGET,
            connection_id = %connection.connection_id,
            error = %err,
            "client frame rejected"
        );
        Some(ServerReply::Error {
            message: err.to_string(),
        })
    })
}
