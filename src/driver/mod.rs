//! Driver Module
//!
//! 클라이언트 API: 채널, 연결, 트랜잭션 원장, 연결 풀
//!
//! # Example
//!
//! ```ignore
//! use tgdb_driver::driver::{ConnectionConfig, ConnectionPool};
//!
//! let config = ConnectionConfig::builder("tcp://scott@localhost:8222")?
//!     .with_credentials("scott", "scott")
//!     .with_pool_size(4)
//!     .build()?;
//! let pool = ConnectionPool::connect(config).await?;
//!
//! let conn = pool.get().await?;
//! conn.get_graph_metadata(false).await?;
//!
//! // 노드 생성 및 커밋
//! let node = conn.graph_object_factory().create_node_of_type("testnode")?;
//! node.set_attribute("name", "Bruce-Wayne")?;
//! conn.insert_entity(&node)?;
//! conn.commit().await?;
//!
//! // 복합 키 조회
//! let key = conn
//!     .graph_object_factory()
//!     .create_composite_key(Some("testnode"))
//!     .with_attribute("name", "Bruce-Wayne")?;
//! let mut result = conn.get_entities(&key, None).await?;
//! while let Some(entity) = result.next() {
//!     println!("{:?}", entity.attribute("name"));
//! }
//!
//! pool.disconnect().await;
//! ```

pub mod channel;
mod config;
mod connection;
mod error;
mod ledger;
mod pool;
mod result_set;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports
pub use channel::{Channel, LinkState, SessionInfo};
pub use config::{
    ChannelUrl, ConnectionConfig, ConnectionConfigBuilder, ReservePolicy, ServerAddress,
    Transport, DEFAULT_CLIENT_ID, DEFAULT_PORT,
};
pub use connection::{AdminCommand, AdminLock, Connection, Query};
pub use error::{DriverError, DriverResult};
pub use ledger::{CommitSummary, LedgerEntry, TransactionLedger};
pub use pool::{ConnectionPool, PoolMetrics, PooledConnection};
pub use result_set::ResultSet;
