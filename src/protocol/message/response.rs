//! Response payloads.
//!
//! Response messages are sent from the server to the client. Payloads that
//! carry an entity stream keep it as raw bytes; the stream is decoded on
//! demand against the caller's object factory (see
//! [`decode_entity_stream`]).

use bytes::Bytes;

use super::{opcode, tx_status, Response};
use crate::model::{AttributeDescriptor, EntityType, GraphObjectFactory, SystemType};
use crate::protocol::error::{ProtocolError, ProtocolResult};
use crate::protocol::graph::{decode_entity_stream, read_descriptor, DecodedGraph};
use crate::protocol::header::VerbId;
use crate::protocol::stream::InputStream;

fn decode_stream(
    stream: Option<&Bytes>,
    factory: &GraphObjectFactory,
) -> ProtocolResult<Option<DecodedGraph>> {
    match stream {
        Some(bytes) => {
            let mut input = InputStream::new(bytes.clone());
            decode_entity_stream(&mut input, factory).map(Some)
        }
        None => Ok(None),
    }
}

// ============================================================================
// Channel-level messages
// ============================================================================

/// Handshake response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    Invalid,
    AcceptChallenge,
    ProceedWithAuthentication,
    ChallengeFailed,
}

impl HandshakeStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::AcceptChallenge,
            2 => Self::ProceedWithAuthentication,
            3 => Self::ChallengeFailed,
            _ => Self::Invalid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandShakeResponse {
    pub status: HandshakeStatus,
    pub challenge: i64,
    /// Server reason when the challenge failed
    pub error_message: Option<String>,
}

impl Response for HandShakeResponse {
    const VERB: VerbId = VerbId::HandShakeResponse;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        let status = HandshakeStatus::from_u8(input.read_u8()?);
        let challenge = input.read_i64()?;
        let error_message = if status == HandshakeStatus::ChallengeFailed {
            let bytes = input.read_bytes()?;
            Some(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            None
        };
        Ok(Self {
            status,
            challenge,
            error_message,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticateResponse {
    pub success: bool,
    pub error_status: Option<i32>,
    pub auth_token: i64,
    pub session_id: i64,
    pub server_cert: Bytes,
}

impl Response for AuthenticateResponse {
    const VERB: VerbId = VerbId::AuthenticateResponse;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        let success = input.read_bool()?;
        let error_status = if success {
            None
        } else {
            Some(input.read_i32()?)
        };
        Ok(Self {
            success,
            error_status,
            auth_token: input.read_i64()?,
            session_id: input.read_i64()?,
            server_cert: input.read_bytes()?,
        })
    }
}

/// Server-reported failure for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionMessage {
    pub code: i32,
    pub message: Option<String>,
}

impl Response for ExceptionMessage {
    const VERB: VerbId = VerbId::Exception;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        Ok(Self {
            code: input.read_i32()?,
            message: input.read_optional_utf()?,
        })
    }
}

/// Server closed the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionForcefullyTerminated {
    pub kind: u8,
    pub message: String,
}

impl Response for SessionForcefullyTerminated {
    const VERB: VerbId = VerbId::SessionForcefullyTerminated;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        Ok(Self {
            kind: input.read_u8()?,
            message: input.read_utf()?,
        })
    }
}

// ============================================================================
// Commit
// ============================================================================

/// Permanent id assigned to an inserted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedEntityId {
    pub temp_id: i64,
    pub real_id: i64,
    pub version: i64,
}

/// Commit outcome and id fix-up tables.
#[derive(Debug, Clone, Default)]
pub struct CommitTransactionResponse {
    pub status: i32,
    pub error_message: Option<String>,
    /// (temporary id, permanent id)
    pub descriptor_ids: Vec<(i32, i32)>,
    pub added: Vec<AddedEntityId>,
    /// (entity id, new version)
    pub changed: Vec<(i64, i64)>,
    pub removed: Vec<i64>,
}

impl CommitTransactionResponse {
    pub fn is_success(&self) -> bool {
        self.status == tx_status::SUCCESS
    }
}

impl Response for CommitTransactionResponse {
    const VERB: VerbId = VerbId::CommitTransactionResponse;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        let _length = input.read_i32()?;
        let _checksum = input.read_i32()?;
        let mut response = Self {
            status: input.read_i32()?,
            ..Self::default()
        };
        if !response.is_success() {
            response.error_message = input.read_utf().ok();
            return Ok(response);
        }

        while input.available() >= 6 {
            let code = input.read_u16()?;
            let count = input.read_i32()?;
            match code {
                opcode::DESCRIPTORS => {
                    for _ in 0..count {
                        let temp = input.read_i32()?;
                        let real = input.read_i32()?;
                        response.descriptor_ids.push((temp, real));
                    }
                }
                opcode::ADDED => {
                    for _ in 0..count {
                        response.added.push(AddedEntityId {
                            temp_id: input.read_i64()?,
                            real_id: input.read_i64()?,
                            version: input.read_i64()?,
                        });
                    }
                }
                opcode::CHANGED => {
                    for _ in 0..count {
                        let id = input.read_i64()?;
                        let version = input.read_i64()?;
                        response.changed.push((id, version));
                    }
                }
                opcode::REMOVED => {
                    for _ in 0..count {
                        response.removed.push(input.read_i64()?);
                    }
                }
                opcode::DEBUG => {
                    let rest = input.available();
                    input.skip(rest)?;
                }
                other => {
                    return Err(ProtocolError::malformed(format!(
                        "unknown commit section 0x{:04X}",
                        other
                    )))
                }
            }
        }
        Ok(response)
    }
}

// ============================================================================
// Queries and lookups
// ============================================================================

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub result: i32,
    pub error_message: Option<String>,
    /// Server handle of a created query
    pub hash_id: i64,
    pub syntax: u8,
    pub annotation: Option<String>,
    pub entity_stream: Option<Bytes>,
}

impl QueryResponse {
    pub fn is_success(&self) -> bool {
        self.result == 0
    }

    /// Decode the attached entity stream, if any.
    pub fn decode_entities(
        &self,
        factory: &GraphObjectFactory,
    ) -> ProtocolResult<Option<DecodedGraph>> {
        decode_stream(self.entity_stream.as_ref(), factory)
    }
}

impl Response for QueryResponse {
    const VERB: VerbId = VerbId::QueryResponse;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        let _length = input.read_i32()?;
        let _checksum = input.read_i32()?;
        let result = input.read_i32()?;
        if result != 0 {
            return Ok(Self {
                result,
                error_message: input.read_utf().ok(),
                hash_id: 0,
                syntax: 0,
                annotation: None,
                entity_stream: None,
            });
        }

        let hash_id = input.read_i64()?;
        let syntax = input.read_u8()?;
        let annotation = Some(input.read_utf()?).filter(|s| !s.is_empty());
        let entity_stream = if syntax == 1 && input.available() > 0 {
            Some(input.remaining_bytes())
        } else {
            None
        };
        Ok(Self {
            result,
            error_message: None,
            hash_id,
            syntax,
            annotation,
            entity_stream,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GetEntityResponse {
    pub result_id: i32,
    pub entity_stream: Option<Bytes>,
}

impl GetEntityResponse {
    pub fn has_result(&self) -> bool {
        self.entity_stream.is_some()
    }

    pub fn decode_entities(
        &self,
        factory: &GraphObjectFactory,
    ) -> ProtocolResult<Option<DecodedGraph>> {
        decode_stream(self.entity_stream.as_ref(), factory)
    }
}

impl Response for GetEntityResponse {
    const VERB: VerbId = VerbId::GetEntityResponse;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        let result_id = input.read_i32()?;
        let entity_stream = if input.read_bool()? {
            Some(input.remaining_bytes())
        } else {
            None
        };
        Ok(Self {
            result_id,
            entity_stream,
        })
    }
}

/// Schema snapshot.
#[derive(Debug, Default)]
pub struct MetadataResponse {
    pub descriptors: Vec<AttributeDescriptor>,
    pub node_types: Vec<EntityType>,
    pub edge_types: Vec<EntityType>,
}

fn read_entity_type(input: &mut InputStream) -> ProtocolResult<EntityType> {
    let system_type = SystemType::from_i8(input.read_u8()? as i8);
    let id = input.read_i32()?;
    let name = input.read_utf()?;
    let mut entity_type = EntityType::new(id, name, system_type);
    entity_type.page_size = input.read_i32()?;
    let count = input.read_i16()?;
    for _ in 0..count {
        entity_type.attribute_names.push(input.read_utf()?);
    }
    Ok(entity_type)
}

impl Response for MetadataResponse {
    const VERB: VerbId = VerbId::MetadataResponse;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        let total = input.read_i32()?;
        let mut response = Self::default();
        let mut consumed = 0;

        while consumed < total {
            let system_type = SystemType::from_i8(input.read_u8()? as i8);
            let count = input.read_i32()?;
            for _ in 0..count {
                match system_type {
                    SystemType::AttributeDescriptor => {
                        response.descriptors.push(read_descriptor(input)?)
                    }
                    SystemType::NodeType => response.node_types.push(read_entity_type(input)?),
                    SystemType::EdgeType => response.edge_types.push(read_entity_type(input)?),
                    SystemType::Invalid => {
                        return Err(ProtocolError::malformed("metadata group of invalid type"))
                    }
                }
            }
            consumed += count.max(1);
        }
        Ok(response)
    }
}

#[derive(Debug, Clone)]
pub struct GetLargeObjectResponse {
    pub result: i32,
    pub entity_id: i64,
    pub data: Option<Bytes>,
}

impl Response for GetLargeObjectResponse {
    const VERB: VerbId = VerbId::GetLargeObjectResponse;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        let result = input.read_i32()?;
        let entity_id = input.read_i64()?;
        let data = if input.read_bool()? {
            Some(input.read_bytes()?)
        } else {
            None
        };
        Ok(Self {
            result,
            entity_id,
            data,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DecryptBufferResponse {
    pub data: Bytes,
}

impl Response for DecryptBufferResponse {
    const VERB: VerbId = VerbId::DecryptBufferResponse;

    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self> {
        Ok(Self {
            data: input.read_bytes()?,
        })
    }
}
