//! Request payloads.
//!
//! Request messages are sent from the client to the server.

use std::sync::Arc;

use bytes::Bytes;

use super::{opcode, Request};
use crate::model::{AttributeDescriptor, CompositeKey, EntityRef};
use crate::protocol::error::{ProtocolError, ProtocolResult};
use crate::protocol::graph::{write_attribute, write_descriptor, write_entity};
use crate::protocol::header::VerbId;
use crate::protocol::stream::OutputStream;

// ============================================================================
// Channel-level messages
// ============================================================================

/// Keep-alive; no payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingMessage;

impl Request for PingMessage {
    const VERB: VerbId = VerbId::Ping;

    fn write_payload(&self, _out: &mut OutputStream) -> ProtocolResult<()> {
        Ok(())
    }
}

/// Handshake request stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeType {
    Invalid,
    Initiate,
    ChallengeAccepted,
}

impl HandshakeType {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Initiate => 1,
            Self::ChallengeAccepted => 2,
        }
    }
}

/// Protocol handshake.
#[derive(Debug, Clone)]
pub struct HandShakeRequest {
    pub request_type: HandshakeType,
    pub ssl_mode: bool,
    pub challenge: i64,
}

impl HandShakeRequest {
    /// First handshake message.
    pub fn initiate(ssl_mode: bool) -> Self {
        Self {
            request_type: HandshakeType::Initiate,
            ssl_mode,
            challenge: 0,
        }
    }

    /// Answer to the server's challenge.
    pub fn accept(ssl_mode: bool, server_challenge: i64) -> Self {
        Self {
            request_type: HandshakeType::ChallengeAccepted,
            ssl_mode,
            challenge: server_challenge * 2 / 3,
        }
    }
}

impl Request for HandShakeRequest {
    const VERB: VerbId = VerbId::HandShakeRequest;

    fn write_payload(&self, out: &mut OutputStream) -> ProtocolResult<()> {
        out.write_u8(self.request_type.as_u8());
        out.write_bool(self.ssl_mode);
        out.write_i64(self.challenge);
        Ok(())
    }
}

/// Credential exchange.
#[derive(Clone, Default)]
pub struct AuthenticateRequest {
    pub client_id: Option<String>,
    pub inbox_addr: Option<String>,
    pub user: Option<String>,
    pub password: Vec<u8>,
}

impl std::fmt::Debug for AuthenticateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticateRequest")
            .field("client_id", &self.client_id)
            .field("inbox_addr", &self.inbox_addr)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Request for AuthenticateRequest {
    const VERB: VerbId = VerbId::AuthenticateRequest;

    fn write_payload(&self, out: &mut OutputStream) -> ProtocolResult<()> {
        out.write_optional_utf(non_empty(&self.client_id))?;
        out.write_optional_utf(non_empty(&self.inbox_addr))?;
        out.write_optional_utf(non_empty(&self.user))?;
        out.write_bytes(&self.password)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Tell the server this channel is going away.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectChannelRequest;

impl Request for DisconnectChannelRequest {
    const VERB: VerbId = VerbId::DisconnectChannelRequest;

    fn write_payload(&self, _out: &mut OutputStream) -> ProtocolResult<()> {
        Ok(())
    }
}

/// Ask the server to log its thread dump.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpStacktraceRequest;

impl Request for DumpStacktraceRequest {
    const VERB: VerbId = VerbId::DumpStacktraceRequest;

    fn write_payload(&self, _out: &mut OutputStream) -> ProtocolResult<()> {
        Ok(())
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// Commit of one ledger.
#[derive(Debug, Clone, Default)]
pub struct CommitTransactionRequest {
    /// Descriptors still carrying a temporary id
    pub descriptors: Vec<Arc<AttributeDescriptor>>,
    pub added: Vec<EntityRef>,
    pub changed: Vec<EntityRef>,
    /// Wire ids of removed entities
    pub removed: Vec<i64>,
}

impl CommitTransactionRequest {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
            && self.added.is_empty()
            && self.changed.is_empty()
            && self.removed.is_empty()
    }
}

fn write_section_header(out: &mut OutputStream, code: u16, count: usize) -> ProtocolResult<()> {
    let count = i32::try_from(count)
        .map_err(|_| ProtocolError::malformed(format!("commit section of {} items", count)))?;
    out.write_u16(code);
    out.write_i32(count);
    Ok(())
}

impl Request for CommitTransactionRequest {
    const VERB: VerbId = VerbId::CommitTransactionRequest;

    fn write_payload(&self, out: &mut OutputStream) -> ProtocolResult<()> {
        let start = out.position();
        out.write_i32(0);
        // checksum
        out.write_i32(0);

        if !self.descriptors.is_empty() {
            write_section_header(out, opcode::DESCRIPTORS, self.descriptors.len())?;
            for desc in &self.descriptors {
                write_descriptor(out, desc)?;
            }
        }
        if !self.added.is_empty() {
            write_section_header(out, opcode::ADDED, self.added.len())?;
            for entity in &self.added {
                write_entity(out, entity)?;
            }
        }
        if !self.changed.is_empty() {
            write_section_header(out, opcode::CHANGED, self.changed.len())?;
            for entity in &self.changed {
                write_entity(out, entity)?;
            }
        }
        if !self.removed.is_empty() {
            write_section_header(out, opcode::REMOVED, self.removed.len())?;
            for id in &self.removed {
                out.write_i64(*id);
            }
        }

        out.patch_length_at(start)
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Result shaping shared by queries and entity lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub fetch_size: i32,
    pub batch_size: i16,
    pub traversal_depth: i16,
    pub edge_limit: i16,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fetch_size: 1000,
            batch_size: 50,
            traversal_depth: 3,
            edge_limit: 0,
        }
    }
}

impl QueryOptions {
    fn write(&self, out: &mut OutputStream) {
        out.write_i32(self.fetch_size);
        out.write_i16(self.batch_size);
        out.write_i16(self.traversal_depth);
        out.write_i16(self.edge_limit);
    }
}

/// Query sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCommand {
    Create,
    Execute,
    ExecuteId,
    Close,
}

impl QueryCommand {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Create => 1,
            Self::Execute => 2,
            Self::ExecuteId => 3,
            Self::Close => 4,
        }
    }
}

/// Optional traversal filters for an ad-hoc query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilters {
    pub edge_filter: Option<String>,
    pub traversal_condition: Option<String>,
    pub end_condition: Option<String>,
}

/// Query create/execute/close.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub command: QueryCommand,
    pub options: QueryOptions,
    pub expression: Option<String>,
    pub hash_id: i64,
    pub filters: Option<QueryFilters>,
}

impl QueryRequest {
    /// Compile a query on the server.
    pub fn create(expression: impl Into<String>, options: QueryOptions) -> Self {
        Self {
            command: QueryCommand::Create,
            options,
            expression: Some(expression.into()),
            hash_id: 0,
            filters: None,
        }
    }

    /// Run an ad-hoc query.
    pub fn execute(
        expression: impl Into<String>,
        filters: Option<QueryFilters>,
        options: QueryOptions,
    ) -> Self {
        Self {
            command: QueryCommand::Execute,
            options,
            expression: Some(expression.into()),
            hash_id: 0,
            filters,
        }
    }

    /// Run a previously created query.
    pub fn execute_id(hash_id: i64, options: QueryOptions) -> Self {
        Self {
            command: QueryCommand::ExecuteId,
            options,
            expression: None,
            hash_id,
            filters: None,
        }
    }

    /// Release a created query.
    pub fn close(hash_id: i64) -> Self {
        Self {
            command: QueryCommand::Close,
            options: QueryOptions::default(),
            expression: None,
            hash_id,
            filters: None,
        }
    }
}

impl Request for QueryRequest {
    const VERB: VerbId = VerbId::QueryRequest;

    fn write_payload(&self, out: &mut OutputStream) -> ProtocolResult<()> {
        out.write_i32(1);
        out.write_i32(1);
        out.write_i32(self.command.as_i32());
        self.options.write(out);

        match self.command {
            QueryCommand::Create | QueryCommand::Execute => {
                let expression = self
                    .expression
                    .as_deref()
                    .ok_or_else(|| ProtocolError::malformed("query without expression"))?;
                out.write_utf(expression)?;
            }
            QueryCommand::ExecuteId | QueryCommand::Close => out.write_i64(self.hash_id),
        }

        if self.command == QueryCommand::Execute {
            match &self.filters {
                Some(filters) => {
                    out.write_bool(true);
                    out.write_optional_utf(filters.edge_filter.as_deref())?;
                    out.write_optional_utf(filters.traversal_condition.as_deref())?;
                    out.write_optional_utf(filters.end_condition.as_deref())?;
                }
                None => out.write_bool(false),
            }
        }
        Ok(())
    }
}

// ============================================================================
// Lookups
// ============================================================================

/// Schema download; no payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataRequest;

impl Request for MetadataRequest {
    const VERB: VerbId = VerbId::MetadataRequest;

    fn write_payload(&self, _out: &mut OutputStream) -> ProtocolResult<()> {
        Ok(())
    }
}

/// GetEntity sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetEntityCommand {
    Get,
    GetMultiple,
    GetEntities,
}

impl GetEntityCommand {
    pub fn as_i16(self) -> i16 {
        match self {
            Self::Get => 0,
            Self::GetMultiple => 1,
            Self::GetEntities => 2,
        }
    }
}

/// Entity lookup by composite key.
#[derive(Debug, Clone)]
pub struct GetEntityRequest {
    pub command: GetEntityCommand,
    pub result_id: i32,
    pub options: QueryOptions,
    pub key: CompositeKey,
}

impl Request for GetEntityRequest {
    const VERB: VerbId = VerbId::GetEntityRequest;

    fn write_payload(&self, out: &mut OutputStream) -> ProtocolResult<()> {
        out.write_i16(self.command.as_i16());
        out.write_i32(self.result_id);
        self.options.write(out);

        match self.key.type_name() {
            Some(name) => {
                out.write_bool(true);
                out.write_utf(name)?;
            }
            None => out.write_bool(false),
        }
        let attrs = self.key.attributes();
        let count = i16::try_from(attrs.len())
            .map_err(|_| ProtocolError::malformed(format!("key of {} attributes", attrs.len())))?;
        out.write_i16(count);
        for attr in attrs {
            write_attribute(out, attr)?;
        }
        Ok(())
    }
}

/// Large-object content fetch.
#[derive(Debug, Clone, Copy)]
pub struct GetLargeObjectRequest {
    pub entity_id: i64,
    pub decrypt: bool,
}

impl Request for GetLargeObjectRequest {
    const VERB: VerbId = VerbId::GetLargeObjectRequest;

    fn write_payload(&self, out: &mut OutputStream) -> ProtocolResult<()> {
        out.write_i64(self.entity_id);
        out.write_bool(self.decrypt);
        Ok(())
    }
}

/// Server-side decryption of an encrypted buffer.
#[derive(Debug, Clone)]
pub struct DecryptBufferRequest {
    pub data: Bytes,
}

impl Request for DecryptBufferRequest {
    const VERB: VerbId = VerbId::DecryptBufferRequest;

    fn write_payload(&self, out: &mut OutputStream) -> ProtocolResult<()> {
        out.write_bytes(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphMetadata, GraphObjectFactory};
    use crate::protocol::header::MessageHeader;
    use crate::protocol::stream::InputStream;

    fn payload<R: Request>(req: &R) -> InputStream {
        let frame = req
            .to_frame(MessageHeader::new(R::VERB, 1))
            .unwrap();
        frame.payload_stream()
    }

    #[test]
    fn test_handshake_challenge() {
        let req = HandShakeRequest::accept(false, 300);
        assert_eq!(req.challenge, 200);
        let mut input = payload(&req);
        assert_eq!(input.read_u8().unwrap(), 2);
        assert!(!input.read_bool().unwrap());
        assert_eq!(input.read_i64().unwrap(), 200);
    }

    #[test]
    fn test_authenticate_payload() {
        let req = AuthenticateRequest {
            client_id: Some("client".into()),
            inbox_addr: None,
            user: Some("scott".into()),
            password: b"tiger".to_vec(),
        };
        let mut input = payload(&req);
        assert_eq!(input.read_optional_utf().unwrap().as_deref(), Some("client"));
        assert_eq!(input.read_optional_utf().unwrap(), None);
        assert_eq!(input.read_optional_utf().unwrap().as_deref(), Some("scott"));
        assert_eq!(&input.read_bytes().unwrap()[..], b"tiger");
        assert_eq!(input.available(), 0);
        assert!(!format!("{:?}", req).contains("tiger"));
    }

    #[test]
    fn test_commit_sections() {
        let factory = GraphObjectFactory::new(Arc::new(GraphMetadata::new()));
        let node = factory.create_node();
        node.set_attribute("name", "x").unwrap();
        let req = CommitTransactionRequest {
            descriptors: factory.metadata().pending_attribute_descriptors(),
            added: vec![node],
            changed: Vec::new(),
            removed: vec![42],
        };
        let mut input = payload(&req);

        let len = input.read_i32().unwrap();
        assert_eq!(len as usize, input.len());
        assert_eq!(input.read_i32().unwrap(), 0);
        assert_eq!(input.read_u16().unwrap(), opcode::DESCRIPTORS);
        assert_eq!(input.read_i32().unwrap(), 1);
        crate::protocol::graph::read_descriptor(&mut input).unwrap();
        assert_eq!(input.read_u16().unwrap(), opcode::ADDED);
        assert_eq!(input.read_i32().unwrap(), 1);
        let record_len = input.read_i32().unwrap();
        input.skip(record_len as usize - 4).unwrap();
        // no changed section
        assert_eq!(input.read_u16().unwrap(), opcode::REMOVED);
        assert_eq!(input.read_i32().unwrap(), 1);
        assert_eq!(input.read_i64().unwrap(), 42);
        assert_eq!(input.available(), 0);
    }

    #[test]
    fn test_query_execute_with_filters() {
        let req = QueryRequest::execute(
            "@nodetype = 'testnode';",
            Some(QueryFilters {
                edge_filter: None,
                traversal_condition: Some("depth < 2".into()),
                end_condition: None,
            }),
            QueryOptions::default(),
        );
        let mut input = payload(&req);
        assert_eq!(input.read_i32().unwrap(), 1);
        assert_eq!(input.read_i32().unwrap(), 1);
        assert_eq!(input.read_i32().unwrap(), 2);
        assert_eq!(input.read_i32().unwrap(), 1000);
        assert_eq!(input.read_i16().unwrap(), 50);
        assert_eq!(input.read_i16().unwrap(), 3);
        assert_eq!(input.read_i16().unwrap(), 0);
        assert_eq!(input.read_utf().unwrap(), "@nodetype = 'testnode';");
        assert!(input.read_bool().unwrap());
        assert_eq!(input.read_optional_utf().unwrap(), None);
        assert_eq!(input.read_optional_utf().unwrap().as_deref(), Some("depth < 2"));
        assert_eq!(input.read_optional_utf().unwrap(), None);
        assert_eq!(input.available(), 0);
    }

    #[test]
    fn test_query_close_carries_hash_id() {
        let mut input = payload(&QueryRequest::close(77));
        input.skip(12 + 10).unwrap();
        assert_eq!(input.read_i64().unwrap(), 77);
        assert_eq!(input.available(), 0);
    }

    #[test]
    fn test_get_entity_payload() {
        let factory = GraphObjectFactory::new(Arc::new(GraphMetadata::new()));
        let key = factory
            .create_composite_key(Some("testnode"))
            .with_attribute("name", "Bruce-Wayne")
            .unwrap();
        let req = GetEntityRequest {
            command: GetEntityCommand::Get,
            result_id: 0,
            options: QueryOptions::default(),
            key,
        };
        let mut input = payload(&req);
        assert_eq!(input.read_i16().unwrap(), 0);
        assert_eq!(input.read_i32().unwrap(), 0);
        input.skip(10).unwrap();
        assert!(input.read_bool().unwrap());
        assert_eq!(input.read_utf().unwrap(), "testnode");
        assert_eq!(input.read_i16().unwrap(), 1);
    }
}
