//! Real-time WebSocket endpoint — 顾客 / 员工 / 管理员共用
//!
//! GET /ws
//!
//! 协议（JSON 文本帧，`{"event": "...", "data": {...}}`）:
//! - Client → Hub: ClientIntent (join_*, leave_*, create_order, update_order_status, ...)
//! - Hub → Client: ServerEvent (直接回复 / 房间广播 / error)
//!
//! 每个连接两条任务：
//! - writer: 独占 sink，按入队顺序写出 outbound 队列，并定时 Ping
//! - reader: 顺序解析并处理意图；同一连接的意图按到达顺序处理
//!
//! 连接结束（Close / 读错误 / 空闲超时 / 写失败）时从所有房间移除。

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use shared::message::{ClientIntent, ServerEvent};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::OrderError;
use crate::live::{ConnectionId, Outbound};
use crate::state::AppState;

/// GET /ws
pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_session(socket, state))
}

async fn ws_session(socket: WebSocket, state: AppState) {
    let (sink, mut stream) = socket.split();

    let (tx, rx) = mpsc::channel::<Outbound>(state.config.ws_outbound_capacity);
    let conn = state.registry.connect(tx);
    tracing::info!(conn_id = %conn, "WS connected");

    let mut writer = tokio::spawn(write_loop(sink, rx, state.config.ws_ping_interval, conn));
    let idle_timeout = state.config.ws_idle_timeout;

    loop {
        tokio::select! {
            _ = &mut writer => {
                tracing::debug!(conn_id = %conn, "WS writer stopped");
                break;
            }

            msg = tokio::time::timeout(idle_timeout, stream.next()) => {
                let Ok(msg) = msg else {
                    tracing::info!(conn_id = %conn, timeout_secs = idle_timeout.as_secs(), "WS idle timeout");
                    break;
                };
                match msg {
                    Some(Ok(Message::Text(text))) => handle_text(&state, conn, &text).await,
                    Some(Ok(Message::Binary(_))) => {
                        let err = OrderError::InvalidRequest("Binary frames are not supported".into());
                        state.dispatcher.reject(conn, err.into()).await;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(conn_id = %conn, error = %e, "WS read error");
                        break;
                    }
                }
            }
        }
    }

    let left = state.registry.disconnect(conn);
    writer.abort();
    tracing::info!(conn_id = %conn, audiences = left.len(), "WS disconnected");
}

async fn handle_text(state: &AppState, conn: ConnectionId, text: &str) {
    match serde_json::from_str::<ClientIntent>(text) {
        Ok(intent) => state.dispatcher.dispatch(conn, intent).await,
        Err(e) => {
            tracing::debug!(conn_id = %conn, error = %e, "Malformed client message");
            let err = OrderError::InvalidRequest(format!("Malformed message: {e}"));
            state.dispatcher.reject(conn, err.into()).await;
        }
    }
}

async fn write_loop<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Outbound>,
    ping_every: Duration,
    conn: ConnectionId,
) where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let mut ping_interval = tokio::time::interval(ping_every);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            event = rx.recv() => {
                let Some(event) = event else { break };
                if send_message(&mut sink, &event).await.is_err() {
                    tracing::debug!(conn_id = %conn, event = event.name(), "WS write failed");
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

async fn send_message<S>(sink: &mut S, msg: &ServerEvent) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
