//! Connection Pool
//!
//! 연결 풀링
//!
//! All connections are created up front. A semaphore with one permit per
//! connection enforces the reserve policy; the idle queue always holds
//! exactly as many connections as there are free permits.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{AcquireError, Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::channel::Channel;
use super::config::{ConnectionConfig, ReservePolicy};
use super::connection::{AdminLock, Connection};
use super::error::{DriverError, DriverResult};
use crate::model::GraphMetadata;

// ============================================================================
// PooledConnection - 풀링된 연결
// ============================================================================

/// Connection checked out of a pool; goes back to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<ConnectionPool>,
}

impl PooledConnection {
    /// 풀로 반환
    pub fn return_to_pool(self) {
        drop(self);
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `Drop` takes the connection out.
        match self.conn.as_ref() {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(conn);
        }
        // permit released after the connection is back in the queue
        self.permit.take();
    }
}

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    /// 전체 연결 수
    pub size: usize,
    /// 유휴 연결 수
    pub idle: usize,
    /// 사용 중인 연결 수
    pub in_use: usize,
    /// 채널 수
    pub channels: usize,
    /// 총 획득 횟수
    pub total_acquisitions: u64,
    /// 총 타임아웃 횟수
    pub total_timeouts: u64,
}

// ============================================================================
// ConnectionPool - 연결 풀
// ============================================================================

/// Fixed-size set of connections sharing one schema and one admin lock.
pub struct ConnectionPool {
    config: ConnectionConfig,
    admin_lock: AdminLock,
    metadata: Arc<GraphMetadata>,
    channels: Vec<Arc<Channel>>,
    /// 유휴 연결들
    idle_connections: Mutex<VecDeque<Connection>>,
    semaphore: Arc<Semaphore>,
    size: usize,
    in_use: AtomicUsize,
    total_acquisitions: AtomicU64,
    total_timeouts: AtomicU64,
    open: RwLock<bool>,
}

impl ConnectionPool {
    /// Connect every channel and create `pool_size` connections.
    ///
    /// Connections share one channel unless the configuration asks for a
    /// dedicated channel per connection.
    pub async fn connect(config: ConnectionConfig) -> DriverResult<Arc<Self>> {
        let size = config.pool_size;
        let channel_count = if config.dedicated_channel { size } else { 1 };

        let mut channels = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            match Channel::connect(&config).await {
                Ok(channel) => channels.push(channel),
                Err(e) => {
                    for channel in &channels {
                        channel.disconnect().await;
                    }
                    return Err(e);
                }
            }
        }

        let admin_lock: AdminLock = Arc::new(AsyncMutex::new(()));
        let metadata = Arc::new(GraphMetadata::new());
        let idle: VecDeque<Connection> = (0..size)
            .map(|i| {
                Connection::new(
                    channels[i % channels.len()].clone(),
                    admin_lock.clone(),
                    metadata.clone(),
                    config.query_options,
                )
            })
            .collect();

        info!(
            "Connection pool ready: {} connections over {} channel(s) to {}",
            size,
            channels.len(),
            config.url.address
        );

        Ok(Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(size)),
            idle_connections: Mutex::new(idle),
            config,
            admin_lock,
            metadata,
            channels,
            size,
            in_use: AtomicUsize::new(0),
            total_acquisitions: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
            open: RwLock::new(true),
        }))
    }

    /// Reserve a connection according to the configured policy.
    pub async fn get(self: &Arc<Self>) -> DriverResult<PooledConnection> {
        if !self.is_open() {
            return Err(DriverError::pool("Pool is closed"));
        }

        let permit = self.reserve().await?;
        let conn = self
            .idle_connections
            .lock()
            .pop_front()
            .ok_or_else(|| DriverError::pool("No idle connection behind a free permit"))?;

        self.total_acquisitions.fetch_add(1, Ordering::Relaxed);
        self.in_use.fetch_add(1, Ordering::Relaxed);
        debug!("Connection {} reserved", conn.id());

        Ok(PooledConnection {
            conn: Some(conn),
            permit: Some(permit),
            pool: self.clone(),
        })
    }

    async fn reserve(&self) -> DriverResult<OwnedSemaphorePermit> {
        let closed = |_: AcquireError| DriverError::pool("Pool is closed");
        match self.config.reserve_policy {
            ReservePolicy::FailFast => self
                .semaphore
                .clone()
                .try_acquire_owned()
                .map_err(|_| DriverError::pool("No connection available")),
            ReservePolicy::WaitForever => {
                self.semaphore.clone().acquire_owned().await.map_err(closed)
            }
            ReservePolicy::Wait(limit) => {
                match tokio::time::timeout(limit, self.semaphore.clone().acquire_owned()).await {
                    Ok(permit) => permit.map_err(closed),
                    Err(_) => {
                        self.total_timeouts.fetch_add(1, Ordering::Relaxed);
                        Err(DriverError::timeout(format!(
                            "No connection available within {:?}",
                            limit
                        )))
                    }
                }
            }
        }
    }

    /// Give a connection back; dropping the [`PooledConnection`] does the
    /// same.
    pub fn release_connection(&self, conn: PooledConnection) {
        drop(conn);
    }

    fn return_connection(&self, conn: Connection) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);
        if !self.is_open() {
            return;
        }
        if conn.pending_changes() > 0 {
            warn!(
                "Connection {} returned with {} uncommitted change(s); rolling back",
                conn.id(),
                conn.pending_changes()
            );
            conn.rollback();
        }
        self.idle_connections.lock().push_back(conn);
    }

    /// Lock serializing compound operations across every connection here.
    pub fn admin_lock(&self) -> &AdminLock {
        &self.admin_lock
    }

    /// Schema shared by every connection here.
    pub fn metadata(&self) -> &Arc<GraphMetadata> {
        &self.metadata
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    /// Close the pool and every channel. Idempotent.
    pub async fn disconnect(&self) {
        {
            let mut open = self.open.write();
            if !*open {
                return;
            }
            *open = false;
        }
        self.semaphore.close();
        self.idle_connections.lock().clear();

        for channel in &self.channels {
            channel.disconnect().await;
        }
        info!("Connection pool to {} closed", self.config.url.address);
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            size: self.size,
            idle: self.idle_count(),
            in_use: self.in_use_count(),
            channels: self.channels.len(),
            total_acquisitions: self.total_acquisitions.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 풀 크기
    pub fn size(&self) -> usize {
        self.size
    }

    /// 유휴 연결 수
    pub fn idle_count(&self) -> usize {
        self.idle_connections.lock().len()
    }

    /// 사용 중인 연결 수
    pub fn in_use_count(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("address", &self.config.url.address)
            .field("size", &self.size)
            .field("idle", &self.idle_count())
            .field("in_use", &self.in_use_count())
            .field("open", &self.is_open())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{reply, MockServer};
    use crate::protocol::{Frame, VerbId};
    use std::time::Duration;

    fn empty_metadata(request: &Frame) -> Vec<Frame> {
        match request.header.verb {
            VerbId::MetadataRequest => vec![reply(request, VerbId::MetadataResponse, |o| {
                o.write_i32(0);
            })],
            _ => Vec::new(),
        }
    }

    async fn pool_with(
        server: &MockServer,
        configure: impl FnOnce(&mut ConnectionConfig),
    ) -> Arc<ConnectionPool> {
        let mut config = server.config();
        configure(&mut config);
        ConnectionPool::connect(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_pool_shares_one_channel() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |_| {}).await;

        assert_eq!(server.connections(), 1);
        let metrics = pool.metrics();
        assert_eq!(metrics.size, 2);
        assert_eq!(metrics.idle, 2);
        assert_eq!(metrics.channels, 1);

        let a = pool.get().await.unwrap();
        let b = pool.get().await.unwrap();
        assert_ne!(a.id(), b.id());
        assert!(Arc::ptr_eq(a.channel(), b.channel()));
        assert!(Arc::ptr_eq(
            a.graph_object_factory().metadata(),
            b.graph_object_factory().metadata()
        ));
        assert_eq!(pool.in_use_count(), 2);
    }

    #[tokio::test]
    async fn test_pool_dedicated_channels() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |c| c.dedicated_channel = true).await;

        assert_eq!(server.connections(), 2);
        let a = pool.get().await.unwrap();
        let b = pool.get().await.unwrap();
        assert!(!Arc::ptr_eq(a.channel(), b.channel()));
    }

    #[tokio::test]
    async fn test_release_returns_connection() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |_| {}).await;

        let conn = pool.get().await.unwrap();
        let id = conn.id();
        assert_eq!(pool.idle_count(), 1);
        pool.release_connection(conn);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.in_use_count(), 0);

        let other = pool.get().await.unwrap();
        assert_ne!(other.id(), id);
        other.return_to_pool();
        assert_eq!(pool.metrics().total_acquisitions, 2);
    }

    #[tokio::test]
    async fn test_release_rolls_back_pending_changes() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |c| c.pool_size = 1).await;

        let conn = pool.get().await.unwrap();
        let node = conn.graph_object_factory().create_node();
        conn.insert_entity(&node).unwrap();
        drop(conn);

        let conn = pool.get().await.unwrap();
        assert_eq!(conn.pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_fail_fast_policy() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |c| {
            c.pool_size = 1;
            c.reserve_policy = ReservePolicy::FailFast;
        })
        .await;

        let _held = pool.get().await.unwrap();
        let err = pool.get().await.unwrap_err();
        assert!(matches!(err, DriverError::Pool(_)));
    }

    #[tokio::test]
    async fn test_bounded_wait_policy() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |c| {
            c.pool_size = 1;
            c.reserve_policy = ReservePolicy::Wait(Duration::from_millis(50));
        })
        .await;

        let held = pool.get().await.unwrap();
        let err = pool.get().await.unwrap_err();
        assert!(matches!(err, DriverError::Timeout(_)));
        assert_eq!(pool.metrics().total_timeouts, 1);

        drop(held);
        assert!(pool.get().await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_forever_policy() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |c| c.pool_size = 1).await;

        let held = pool.get().await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get().await.map(|c| c.id()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let id = held.id();
        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), id);
    }

    #[tokio::test]
    async fn test_admin_lock_serializes_connections() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |_| {}).await;

        let guard = pool.admin_lock().lock().await;
        let task = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let conn = pool.get().await.unwrap();
                conn.get_graph_metadata(true).await.map(|_| ())
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        drop(guard);
        task.await.unwrap().unwrap();
        assert!(pool.metadata().is_initialized());
    }

    #[tokio::test]
    async fn test_disconnect_closes_pool() {
        let server = MockServer::start(empty_metadata).await;
        let pool = pool_with(&server, |_| {}).await;

        let conn = pool.get().await.unwrap();
        pool.disconnect().await;
        pool.disconnect().await;

        assert!(!pool.is_open());
        assert!(!conn.is_connected());
        assert!(matches!(pool.get().await, Err(DriverError::Pool(_))));
        drop(conn);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let server = MockServer::start(empty_metadata).await;
        let mut config = server.config();
        config.url.address.port = 1;
        config.connect_timeout = Duration::from_millis(200);
        assert!(ConnectionPool::connect(config).await.is_err());
    }
}
