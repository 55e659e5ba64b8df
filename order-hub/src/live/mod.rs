//! SessionRegistry — 房间订阅与实时分发
//!
//! 进程内唯一的共享可变状态。按房间键（`restaurant:<id>` / `table:<qr>` /
//! `admin:<id>` / `order:<id>`）维护当前连接集合，广播只发给调用时刻的成员，
//! 不缓存、不重放。
//!
//! ```text
//! WS handler ──connect(tx)──▶ SessionRegistry
//!                              ├── connections: conn_id → (outbound tx, joined keys)
//!                              └── audiences:   AudienceKey → {conn_id}
//!                                        │
//! Dispatcher ──broadcast(key, event)─────┘──try_send──▶ 每个连接的 outbound 队列
//! ```
//!
//! 两张 DashMap 都是分片锁；任何时刻只持有其中一张的一个条目引用，
//! 因此 join / leave / broadcast 可以在任意多个连接上并发调用。

use dashmap::{DashMap, DashSet};
use shared::message::{AudienceKey, ServerEvent};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// 连接句柄（进程内唯一）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// 出站事件（广播时所有接收方共享同一份）
pub type Outbound = Arc<ServerEvent>;

struct ConnectionEntry {
    tx: mpsc::Sender<Outbound>,
    keys: HashSet<AudienceKey>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, ConnectionEntry>,
    audiences: DashMap<AudienceKey, DashSet<ConnectionId>>,
}

/// 房间注册表 — 每个进程构造一次，显式注入给 dispatcher 和 WS handler
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新连接的出站队列
    pub fn connect(&self, tx: mpsc::Sender<Outbound>) -> ConnectionId {
        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.connections.insert(
            id,
            ConnectionEntry {
                tx,
                keys: HashSet::new(),
            },
        );
        id
    }

    /// 断开连接：退出所有房间并移除出站队列
    pub fn disconnect(&self, conn: ConnectionId) -> Vec<AudienceKey> {
        let left = self.leave_all(conn);
        self.inner.connections.remove(&conn);
        left
    }

    /// 加入房间（幂等）。未注册的连接返回 false
    pub fn join(&self, conn: ConnectionId, key: AudienceKey) -> bool {
        {
            let Some(mut entry) = self.inner.connections.get_mut(&conn) else {
                return false;
            };
            entry.keys.insert(key.clone());
        }
        self.inner.audiences.entry(key).or_default().insert(conn);
        true
    }

    /// 离开房间，返回之前是否在房间内
    pub fn leave(&self, conn: ConnectionId, key: &AudienceKey) -> bool {
        let was_member = self
            .inner
            .connections
            .get_mut(&conn)
            .map(|mut entry| entry.keys.remove(key))
            .unwrap_or(false);
        self.remove_member(key, conn);
        was_member
    }

    /// 离开所有房间（断线 / 空闲超时）
    pub fn leave_all(&self, conn: ConnectionId) -> Vec<AudienceKey> {
        let keys: Vec<AudienceKey> = self
            .inner
            .connections
            .get_mut(&conn)
            .map(|mut entry| entry.keys.drain().collect())
            .unwrap_or_default();
        for key in &keys {
            self.remove_member(key, conn);
        }
        keys
    }

    fn remove_member(&self, key: &AudienceKey, conn: ConnectionId) {
        if let Some(members) = self.inner.audiences.get(key) {
            members.remove(&conn);
        }
        // 空房间清理（remove_if 持有分片写锁，与并发 join 互斥）
        self.inner
            .audiences
            .remove_if(key, |_, members| members.is_empty());
    }

    /// 广播给房间内当前所有连接，返回成功入队的连接数
    ///
    /// 使用 `try_send`：慢连接的队列满时丢弃该事件（at-most-once），
    /// 不会阻塞广播方。
    pub fn broadcast(&self, key: &AudienceKey, event: ServerEvent) -> usize {
        let members: Vec<ConnectionId> = match self.inner.audiences.get(key) {
            Some(set) => set.iter().map(|c| *c).collect(),
            None => return 0,
        };

        let event: Outbound = Arc::new(event);
        let mut delivered = 0;
        for conn in members {
            let Some(entry) = self.inner.connections.get(&conn) else {
                continue;
            };
            match entry.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        conn_id = %conn,
                        audience = %key,
                        event = event.name(),
                        "Outbound queue full, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(conn_id = %conn, "Outbound queue closed");
                }
            }
        }

        tracing::debug!(audience = %key, event = event.name(), delivered, "Broadcast");
        delivered
    }

    /// 直接回复单个连接（等待队列空位，不丢弃）
    pub async fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.send_outbound(conn, Arc::new(event)).await
    }

    pub async fn send_outbound(&self, conn: ConnectionId, event: Outbound) -> bool {
        let tx = match self.inner.connections.get(&conn) {
            Some(entry) => entry.tx.clone(),
            None => return false,
        };
        tx.send(event).await.is_ok()
    }

    /// 非阻塞直接回复
    ///
    /// 队列满时把事件交还调用方（之后用 [`Self::send_outbound`] 等待发送）；
    /// 连接已断开时事件直接丢弃。
    pub fn try_send_to(&self, conn: ConnectionId, event: ServerEvent) -> Result<(), Outbound> {
        let Some(entry) = self.inner.connections.get(&conn) else {
            return Ok(());
        };
        match entry.tx.try_send(Arc::new(event)) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => Err(event),
        }
    }

    // ========== Metrics ==========

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn audience_count(&self) -> usize {
        self.inner.audiences.len()
    }

    pub fn audience_size(&self, key: &AudienceKey) -> usize {
        self.inner.audiences.get(key).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_member(&self, conn: ConnectionId, key: &AudienceKey) -> bool {
        self.inner
            .audiences
            .get(key)
            .map(|s| s.contains(&conn))
            .unwrap_or(false)
    }

    pub fn joined_keys(&self, conn: ConnectionId) -> Vec<AudienceKey> {
        self.inner
            .connections
            .get(&conn)
            .map(|entry| entry.keys.iter().cloned().collect())
            .unwrap_or_default()
    }
}
