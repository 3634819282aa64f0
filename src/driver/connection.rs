//! Connection
//!
//! 애플리케이션이 사용하는 연결 API. 채널 위에서 트랜잭션 원장과
//! 쿼리/조회 요청을 묶는다.
//!
//! Every compound operation takes the pool-scoped admin lock before it
//! touches the channel, and holds it through response processing. The
//! guard is dropped on every exit path, errors included.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, info};

use super::channel::Channel;
use super::config::ConnectionConfig;
use super::error::{DriverError, DriverResult};
use super::ledger::{CommitSummary, TransactionLedger};
use super::result_set::ResultSet;
use crate::model::{CompositeKey, EntityRef, GraphMetadata, GraphObjectFactory};
use crate::protocol::message::{
    CommitTransactionResponse, DecryptBufferRequest, DecryptBufferResponse,
    DumpStacktraceRequest, GetEntityCommand, GetEntityRequest, GetEntityResponse,
    GetLargeObjectRequest, GetLargeObjectResponse, MetadataRequest, MetadataResponse,
    QueryFilters, QueryOptions, QueryRequest, QueryResponse,
};

static CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lock serializing compound round trips across one pool.
pub type AdminLock = Arc<AsyncMutex<()>>;

// ============================================================================
// AdminCommand - 관리 명령
// ============================================================================

/// Administrative commands known to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    StopServer,
    CheckpointServer,
    SetServerLogLevel { level: i32 },
    GetInfo,
    GetUsers,
    GetIndices,
    GetAttributeDescriptors,
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StopServer => "StopServer",
            Self::CheckpointServer => "CheckpointServer",
            Self::SetServerLogLevel { .. } => "SetServerLogLevel",
            Self::GetInfo => "GetInfo",
            Self::GetUsers => "GetUsers",
            Self::GetIndices => "GetIndices",
            Self::GetAttributeDescriptors => "GetAttributeDescriptors",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Connection - 연결
// ============================================================================

/// Client connection: one ledger over a (possibly shared) channel.
pub struct Connection {
    id: u64,
    channel: Arc<Channel>,
    admin_lock: AdminLock,
    factory: GraphObjectFactory,
    ledger: Mutex<TransactionLedger>,
    query_options: QueryOptions,
}

impl Connection {
    /// 풀이 사용하는 생성자
    pub(crate) fn new(
        channel: Arc<Channel>,
        admin_lock: AdminLock,
        metadata: Arc<GraphMetadata>,
        query_options: QueryOptions,
    ) -> Self {
        Self {
            id: CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            channel,
            admin_lock,
            factory: GraphObjectFactory::new(metadata),
            ledger: Mutex::new(TransactionLedger::new()),
            query_options,
        }
    }

    /// Open a standalone connection with its own channel and admin lock.
    pub async fn connect(config: &ConnectionConfig) -> DriverResult<Self> {
        let channel = Channel::connect(config).await?;
        Ok(Self::new(
            channel,
            Arc::new(AsyncMutex::new(())),
            Arc::new(GraphMetadata::new()),
            config.query_options,
        ))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// 기본 쿼리 옵션
    pub fn query_options(&self) -> QueryOptions {
        self.query_options
    }

    /// Factory bound to this connection's metadata.
    pub fn graph_object_factory(&self) -> &GraphObjectFactory {
        &self.factory
    }

    fn metadata(&self) -> &Arc<GraphMetadata> {
        self.factory.metadata()
    }

    async fn admin(&self) -> MutexGuard<'_, ()> {
        self.admin_lock.lock().await
    }

    /// Close the underlying channel. A pooled connection shares its channel
    /// with its siblings unless the pool uses dedicated channels.
    pub async fn disconnect(&self) {
        self.channel.disconnect().await;
    }

    // ========================================================================
    // Ledger
    // ========================================================================

    /// Track a new entity for the next commit.
    pub fn insert_entity(&self, entity: &EntityRef) -> DriverResult<()> {
        self.ledger.lock().insert(entity)
    }

    /// Track a modified entity for the next commit.
    pub fn update_entity(&self, entity: &EntityRef) -> DriverResult<()> {
        self.ledger.lock().update(entity)
    }

    /// Track a deletion for the next commit.
    pub fn delete_entity(&self, entity: &EntityRef) -> DriverResult<()> {
        self.ledger.lock().delete(entity)
    }

    /// 대기 중인 변경 수
    pub fn pending_changes(&self) -> usize {
        self.ledger.lock().len()
    }

    /// Send every pending change in one request and apply the server's ids
    /// and versions in place.
    ///
    /// A failed commit leaves the pending changes as they were, so the
    /// caller may retry or [`rollback`](Self::rollback).
    pub async fn commit(&self) -> DriverResult<CommitSummary> {
        let _admin = self.admin().await;

        let request = self.ledger.lock().build_request(self.metadata());
        if request.is_empty() {
            debug!("Connection {}: nothing to commit", self.id);
            return Ok(CommitSummary::default());
        }

        let response: CommitTransactionResponse = self.channel.send_request(&request).await?;
        let summary = self
            .ledger
            .lock()
            .apply_response(&response, self.metadata())?;

        info!(
            connection = self.id,
            added = summary.added,
            changed = summary.changed,
            removed = summary.removed,
            descriptors = summary.descriptors,
            "Transaction committed"
        );
        Ok(summary)
    }

    /// Drop every pending change without contacting the server.
    pub fn rollback(&self) {
        self.ledger.lock().rollback();
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Fetch the entity matching `key`.
    pub async fn get_entity(
        &self,
        key: &CompositeKey,
        options: Option<QueryOptions>,
    ) -> DriverResult<Option<EntityRef>> {
        let result = self.fetch(GetEntityCommand::Get, key, options).await?;
        Ok(result.first())
    }

    /// Fetch every entity matching `key` along with its traversal
    /// neighborhood.
    pub async fn get_entities(
        &self,
        key: &CompositeKey,
        options: Option<QueryOptions>,
    ) -> DriverResult<ResultSet> {
        self.fetch(GetEntityCommand::GetEntities, key, options).await
    }

    async fn fetch(
        &self,
        command: GetEntityCommand,
        key: &CompositeKey,
        options: Option<QueryOptions>,
    ) -> DriverResult<ResultSet> {
        let _admin = self.admin().await;

        let request = GetEntityRequest {
            command,
            result_id: 0,
            options: options.unwrap_or(self.query_options),
            key: key.clone(),
        };
        let response: GetEntityResponse = self.channel.send_request(&request).await?;
        match response.decode_entities(&self.factory)? {
            Some(graph) => Ok(ResultSet::from_decoded(graph, response.result_id)),
            None => Ok(ResultSet::with_result_id(response.result_id)),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Run an ad-hoc query.
    pub async fn execute_query(
        &self,
        expression: &str,
        options: Option<QueryOptions>,
    ) -> DriverResult<ResultSet> {
        let request = QueryRequest::execute(
            expression,
            None,
            options.unwrap_or(self.query_options),
        );
        self.run_query(request).await
    }

    /// Run an ad-hoc query with traversal filters.
    pub async fn execute_query_with_filter(
        &self,
        expression: &str,
        filters: QueryFilters,
        options: Option<QueryOptions>,
    ) -> DriverResult<ResultSet> {
        let request = QueryRequest::execute(
            expression,
            Some(filters),
            options.unwrap_or(self.query_options),
        );
        self.run_query(request).await
    }

    /// Run a query previously compiled with [`create_query`](Self::create_query).
    pub async fn execute_query_with_id(
        &self,
        hash_id: i64,
        options: Option<QueryOptions>,
    ) -> DriverResult<ResultSet> {
        let request = QueryRequest::execute_id(hash_id, options.unwrap_or(self.query_options));
        self.run_query(request).await
    }

    /// Compile a query on the server and return its handle.
    pub async fn create_query(&self, expression: &str) -> DriverResult<Query<'_>> {
        let response = {
            let _admin = self.admin().await;
            let request = QueryRequest::create(expression, self.query_options);
            query_response(self.channel.send_request(&request).await?)?
        };
        debug!("Query created with hash id {}", response.hash_id);
        Ok(Query {
            connection: self,
            hash_id: response.hash_id,
        })
    }

    /// Release a server-side query.
    pub async fn close_query(&self, hash_id: i64) -> DriverResult<()> {
        let _admin = self.admin().await;
        query_response(self.channel.send_request(&QueryRequest::close(hash_id)).await?)?;
        Ok(())
    }

    async fn run_query(&self, request: QueryRequest) -> DriverResult<ResultSet> {
        let _admin = self.admin().await;

        let response = query_response(self.channel.send_request(&request).await?)?;
        match response.decode_entities(&self.factory)? {
            Some(graph) => Ok(ResultSet::from_decoded(graph, 0)),
            None => Ok(ResultSet::new()),
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Schema for this connection, downloaded on first use or when
    /// `refresh` is set.
    pub async fn get_graph_metadata(&self, refresh: bool) -> DriverResult<Arc<GraphMetadata>> {
        let metadata = self.metadata();
        if refresh || !metadata.is_initialized() {
            let _admin = self.admin().await;
            let response: MetadataResponse = self.channel.send_request(&MetadataRequest).await?;
            debug!(
                descriptors = response.descriptors.len(),
                node_types = response.node_types.len(),
                edge_types = response.edge_types.len(),
                "Metadata received"
            );
            metadata.update(response.descriptors, response.node_types, response.edge_types);
        }
        Ok(metadata.clone())
    }

    // ========================================================================
    // Large objects and encryption
    // ========================================================================

    /// Content of a large-object attribute, optionally decrypted by the
    /// server.
    pub async fn get_large_object_as_bytes(
        &self,
        entity_id: i64,
        decrypt: bool,
    ) -> DriverResult<Option<Bytes>> {
        let _admin = self.admin().await;

        let request = GetLargeObjectRequest { entity_id, decrypt };
        let response: GetLargeObjectResponse = self.channel.send_request(&request).await?;
        if response.result != 0 {
            return Err(DriverError::server(
                response.result,
                format!("Large object fetch failed for entity {}", entity_id),
            ));
        }
        Ok(response.data)
    }

    /// 서버 측 복호화
    pub async fn decrypt_buffer(&self, data: impl Into<Bytes>) -> DriverResult<Bytes> {
        let request = DecryptBufferRequest { data: data.into() };
        let response: DecryptBufferResponse = self.channel.send_request(&request).await?;
        Ok(response.data)
    }

    pub async fn decrypt_entity(&self, entity_id: i64) -> DriverResult<Option<Bytes>> {
        self.get_large_object_as_bytes(entity_id, true).await
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Ask the server to log its thread stacks.
    pub async fn dump_stacktrace(&self) -> DriverResult<()> {
        self.channel.send_message(&DumpStacktraceRequest).await
    }

    /// Administrative commands have no request encoding yet.
    pub async fn admin_command(&self, command: AdminCommand) -> DriverResult<()> {
        Err(DriverError::protocol(format!(
            "Admin command {} is not implemented",
            command
        )))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", self.channel.address())
            .field("state", &self.channel.state())
            .field("pending_changes", &self.ledger.lock().len())
            .finish()
    }
}

/// Fail on a non-zero query result.
fn query_response(response: QueryResponse) -> DriverResult<QueryResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let message = response
        .error_message
        .clone()
        .unwrap_or_else(|| format!("Query failed with result {}", response.result));
    Err(DriverError::server(response.result, message))
}

// ============================================================================
// Query - 서버 측 쿼리 핸들
// ============================================================================

/// Compiled server-side query.
#[derive(Debug)]
pub struct Query<'a> {
    connection: &'a Connection,
    hash_id: i64,
}

impl Query<'_> {
    pub fn hash_id(&self) -> i64 {
        self.hash_id
    }

    pub async fn execute(&self, options: Option<QueryOptions>) -> DriverResult<ResultSet> {
        self.connection
            .execute_query_with_id(self.hash_id, options)
            .await
    }

    /// Release the query on the server.
    pub async fn close(self) -> DriverResult<()> {
        self.connection.close_query(self.hash_id).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{reply, MockServer};
    use crate::model::{AttributeDescriptor, AttributeType, EntityKind, Value};
    use crate::protocol::graph::{write_descriptor, write_value};
    use crate::protocol::message::{opcode, tx_status};
    use crate::protocol::{Frame, OutputStream, VerbId};

    const NAME_ID: i32 = 1;
    const NODE_TYPE_ID: i32 = 10;

    fn metadata_reply(request: &Frame) -> Frame {
        reply(request, VerbId::MetadataResponse, |o| {
            o.write_i32(3);
            o.write_u8(0);
            o.write_i32(1);
            let desc = AttributeDescriptor::with_id(NAME_ID, "name", AttributeType::String, false);
            write_descriptor(o, &desc).unwrap();
            o.write_u8(1);
            o.write_i32(2);
            for (id, name) in [(NODE_TYPE_ID, "testnode"), (11, "@system")] {
                o.write_u8(1);
                o.write_i32(id);
                o.write_utf(name).unwrap();
                o.write_i32(4096);
                o.write_i16(1);
                o.write_utf("name").unwrap();
            }
        })
    }

    /// One result node with a string "name".
    fn single_node_stream(o: &mut OutputStream, id: i64, name: &str) {
        o.write_i32(1);
        o.write_i32(1);
        o.write_bool(true);
        o.write_u8(EntityKind::Node.as_u8());
        o.write_i64(id);

        let start = o.position();
        o.write_i32(0);
        o.write_bool(false);
        o.write_u8(EntityKind::Node.as_u8());
        o.write_i64(id);
        o.write_i32(1);
        o.write_i32(NODE_TYPE_ID);
        o.write_i32(1);
        o.write_i32(NAME_ID);
        o.write_bool(false);
        let desc = AttributeDescriptor::with_id(NAME_ID, "name", AttributeType::String, false);
        write_value(o, &Value::from(name), &desc).unwrap();
        o.write_i32(0);
        o.patch_length_at(start).unwrap();
    }

    fn query_reply(request: &Frame, hash_id: i64, with_node: bool) -> Frame {
        reply(request, VerbId::QueryResponse, |o| {
            o.write_i32(0);
            o.write_i32(0);
            o.write_i32(0);
            o.write_i64(hash_id);
            o.write_u8(u8::from(with_node));
            o.write_utf("").unwrap();
            if with_node {
                single_node_stream(o, 4242, "Alfred");
            }
        })
    }

    /// Virtual id of the first added entity in a commit request.
    fn first_added_id(request: &Frame) -> Option<i64> {
        let mut input = request.payload_stream();
        input.skip(8).ok()?;
        let code = input.read_u16().ok()?;
        let count = input.read_i32().ok()?;
        if code != opcode::ADDED || count == 0 {
            return None;
        }
        let _length = input.read_i32().ok()?;
        let _is_new = input.read_bool().ok()?;
        let _kind = input.read_u8().ok()?;
        input.read_i64().ok()
    }

    fn handler(request: &Frame) -> Vec<Frame> {
        match request.header.verb {
            VerbId::MetadataRequest => vec![metadata_reply(request)],
            VerbId::GetEntityRequest => {
                vec![reply(request, VerbId::GetEntityResponse, |o| {
                    o.write_i32(5);
                    o.write_bool(true);
                    single_node_stream(o, 100, "Bruce-Wayne");
                })]
            }
            VerbId::QueryRequest => {
                let mut input = request.payload_stream();
                input.skip(8).unwrap();
                let command = input.read_i32().unwrap();
                let reply = match command {
                    1 => query_reply(request, 991, false),
                    2 => {
                        input.skip(10).unwrap();
                        let expression = input.read_utf().unwrap();
                        if expression.contains("bogus") {
                            reply(request, VerbId::QueryResponse, |o| {
                                o.write_i32(0);
                                o.write_i32(0);
                                o.write_i32(3);
                                o.write_utf("syntax error").unwrap();
                            })
                        } else {
                            query_reply(request, 0, true)
                        }
                    }
                    3 => query_reply(request, 991, true),
                    _ => query_reply(request, 991, false),
                };
                vec![reply]
            }
            VerbId::CommitTransactionRequest => {
                let added = first_added_id(request);
                vec![reply(request, VerbId::CommitTransactionResponse, |o| {
                    o.write_i32(0);
                    o.write_i32(0);
                    match added {
                        Some(temp_id) => {
                            o.write_i32(tx_status::SUCCESS);
                            o.write_u16(opcode::ADDED);
                            o.write_i32(1);
                            o.write_i64(temp_id);
                            o.write_i64(5000);
                            o.write_i64(1);
                        }
                        None => {
                            o.write_i32(tx_status::OPTIMISTIC_LOCK_FAILED);
                            o.write_utf("version mismatch").unwrap();
                        }
                    }
                })]
            }
            VerbId::GetLargeObjectRequest => {
                let mut input = request.payload_stream();
                let entity_id = input.read_i64().unwrap();
                let decrypt = input.read_bool().unwrap();
                vec![reply(request, VerbId::GetLargeObjectResponse, |o| {
                    o.write_i32(0);
                    o.write_i64(entity_id);
                    o.write_bool(true);
                    let data: &[u8] = if decrypt { b"plain" } else { b"cipher" };
                    o.write_bytes(data).unwrap();
                })]
            }
            VerbId::DecryptBufferRequest => {
                let data = request.payload_stream().read_bytes().unwrap();
                vec![reply(request, VerbId::DecryptBufferResponse, |o| {
                    let mut reversed = data.to_vec();
                    reversed.reverse();
                    o.write_bytes(&reversed).unwrap();
                })]
            }
            _ => Vec::new(),
        }
    }

    async fn connected() -> (MockServer, Connection) {
        let server = MockServer::start(handler).await;
        let conn = Connection::connect(&server.config()).await.unwrap();
        (server, conn)
    }

    #[tokio::test]
    async fn test_graph_metadata_skips_system_types() {
        let (_server, conn) = connected().await;

        let metadata = conn.get_graph_metadata(false).await.unwrap();
        assert!(metadata.is_initialized());
        assert_eq!(metadata.attribute_descriptor("name").unwrap().id(), NAME_ID);
        assert!(metadata.node_type("testnode").is_some());
        assert!(metadata.node_type("@system").is_none());
        assert!(Arc::ptr_eq(&metadata, conn.graph_object_factory().metadata()));
    }

    #[tokio::test]
    async fn test_get_entity_by_key() {
        let (_server, conn) = connected().await;
        conn.get_graph_metadata(false).await.unwrap();

        let key = conn
            .graph_object_factory()
            .create_composite_key(Some("testnode"))
            .with_attribute("name", "Bruce-Wayne")
            .unwrap();

        let result = conn.get_entities(&key, None).await.unwrap();
        assert_eq!(result.count(), 1);
        assert_eq!(result.result_id(), 5);
        let node = result.first().unwrap();
        assert_eq!(node.kind(), EntityKind::Node);
        assert_eq!(node.entity_id(), 100);
        assert_eq!(
            node.attribute("name").unwrap().as_str(),
            Some("Bruce-Wayne")
        );
        assert_eq!(node.entity_type().unwrap().name, "testnode");

        let single = conn.get_entity(&key, None).await.unwrap().unwrap();
        assert_eq!(single.entity_id(), 100);
    }

    #[tokio::test]
    async fn test_commit_assigns_server_id() {
        let (_server, conn) = connected().await;
        conn.get_graph_metadata(false).await.unwrap();

        let node = conn.graph_object_factory().create_node();
        node.set_attribute("name", "Selina").unwrap();
        let virtual_id = node.virtual_id();
        conn.insert_entity(&node).unwrap();
        assert_eq!(conn.pending_changes(), 1);

        let summary = conn.commit().await.unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(node.entity_id(), 5000);
        assert_eq!(node.virtual_id(), virtual_id);
        assert!(!node.is_new());
        assert!(!node.is_modified());
        assert_eq!(conn.pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_empty_commit_skips_network() {
        let server = MockServer::start(|_| Vec::new()).await;
        let conn = Connection::connect(&server.config()).await.unwrap();

        let summary = conn.commit().await.unwrap();
        assert_eq!(summary, CommitSummary::default());
        assert_eq!(conn.channel().pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_version_conflict_keeps_ledger() {
        let (_server, conn) = connected().await;
        conn.get_graph_metadata(false).await.unwrap();

        let key = conn
            .graph_object_factory()
            .create_composite_key(Some("testnode"))
            .with_attribute("name", "Bruce-Wayne")
            .unwrap();
        let result = conn.get_entities(&key, None).await.unwrap();
        let node = result.first().unwrap();
        node.set_attribute("name", "Batman").unwrap();
        conn.update_entity(&node).unwrap();

        let err = conn.commit().await.unwrap_err();
        assert!(matches!(err, DriverError::VersionConflict(_)));
        assert_eq!(conn.pending_changes(), 1);
        assert!(node.is_modified());

        conn.rollback();
        assert_eq!(conn.pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_query_lifecycle() {
        let (_server, conn) = connected().await;
        conn.get_graph_metadata(false).await.unwrap();

        let query = conn.create_query("g.V().has('name')").await.unwrap();
        assert_eq!(query.hash_id(), 991);

        let mut result = query.execute(None).await.unwrap();
        let node = result.next().unwrap();
        assert_eq!(node.attribute("name").unwrap().as_str(), Some("Alfred"));
        assert!(result.next().is_none());

        query.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_query_and_failure() {
        let (_server, conn) = connected().await;
        conn.get_graph_metadata(false).await.unwrap();

        let result = conn.execute_query("g.V()", None).await.unwrap();
        assert_eq!(result.count(), 1);

        let filters = QueryFilters {
            edge_filter: Some("knows".into()),
            ..QueryFilters::default()
        };
        let filtered = conn
            .execute_query_with_filter("g.V()", filters, None)
            .await
            .unwrap();
        assert_eq!(filtered.count(), 1);

        let err = conn.execute_query("bogus", None).await.unwrap_err();
        match err {
            DriverError::Server { code, message } => {
                assert_eq!(code, 3);
                assert_eq!(message, "syntax error");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_large_object_and_decrypt() {
        let (_server, conn) = connected().await;

        let raw = conn.get_large_object_as_bytes(12, false).await.unwrap();
        assert_eq!(raw.as_deref(), Some(&b"cipher"[..]));
        let plain = conn.decrypt_entity(12).await.unwrap();
        assert_eq!(plain.as_deref(), Some(&b"plain"[..]));

        let decrypted = conn.decrypt_buffer(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(&decrypted[..], b"cba");
    }

    #[tokio::test]
    async fn test_admin_command_not_implemented() {
        let (_server, conn) = connected().await;
        let err = conn.admin_command(AdminCommand::GetInfo).await.unwrap_err();
        assert!(matches!(err, DriverError::Protocol(_)));
        conn.dump_stacktrace().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (_server, conn) = connected().await;
        assert!(conn.is_connected());
        conn.disconnect().await;
        assert!(!conn.is_connected());
        assert!(conn.execute_query("g.V()", None).await.is_err());
    }
}
