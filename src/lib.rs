//! # TGDB Driver
//!
//! An async Rust client for TGDB-compatible graph database servers.
//!
//! ## Features
//!
//! - **Binary wire protocol** - Framed request/response codec with an entity-graph decoder
//! - **Async/Await** - Built on Tokio; many callers share one socket per channel
//! - **Connection Pooling** - Fixed-size pool with a configurable reserve policy
//! - **Transactions** - Client-side change ledger with in-place id fix-up on commit
//! - **Object model** - Nodes, edges and graphs with typed attributes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tgdb_driver::{Connection, ConnectionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::builder("tcp://scott@localhost:8222")?
//!         .with_credentials("scott", "scott")
//!         .build()?;
//!     let conn = Connection::connect(&config).await?;
//!     conn.get_graph_metadata(false).await?;
//!
//!     let factory = conn.graph_object_factory();
//!     let bruce = factory.create_node_of_type("testnode")?;
//!     bruce.set_attribute("name", "Bruce-Wayne")?;
//!     let alfred = factory.create_node_of_type("testnode")?;
//!     alfred.set_attribute("name", "Alfred")?;
//!     let edge = factory.create_edge(&bruce, &alfred, tgdb_driver::Direction::Directed)?;
//!
//!     conn.insert_entity(&bruce)?;
//!     conn.insert_entity(&alfred)?;
//!     conn.insert_entity(&edge)?;
//!     conn.commit().await?;
//!
//!     // ids assigned by the server are visible through every reference
//!     assert!(!bruce.is_new());
//!     assert_eq!(edge.from_node().map(|n| n.entity_id()), Some(bruce.entity_id()));
//!
//!     conn.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`DriverResult`]:
//!
//! ```rust,no_run
//! # use tgdb_driver::{Connection, ConnectionConfig, DriverError};
//! # async fn example(conn: Connection) {
//! match conn.commit().await {
//!     Ok(summary) => println!("committed {} new entities", summary.added),
//!     Err(DriverError::VersionConflict(msg)) => {
//!         eprintln!("stale data: {}", msg);
//!         conn.rollback();
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Channel, connection, ledger and pool
//! - [`model`] - Entity and attribute object model
//! - [`protocol`] - Wire codec and message types
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;
pub mod model;
pub mod protocol;

// Re-exports for convenience
pub use driver::{
    AdminCommand, Channel, CommitSummary, Connection, ConnectionConfig, ConnectionConfigBuilder,
    ConnectionPool, DriverError, DriverResult, LinkState, PoolMetrics, PooledConnection, Query,
    ReservePolicy, ResultSet, ServerAddress, TransactionLedger,
};

pub use model::{
    Attribute, AttributeDescriptor, AttributeType, CompositeKey, Direction, Entity, EntityKind,
    EntityRef, GraphMetadata, GraphObjectFactory, Value,
};

pub use protocol::message::{QueryFilters, QueryOptions};
pub use protocol::{ProtocolError, ProtocolResult};
