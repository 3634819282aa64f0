//! Verb ids and the fixed message header.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use super::error::{ProtocolError, ProtocolResult};
use super::stream::{InputStream, OutputStream};

/// Header magic number.
pub const MAGIC: i32 = 0x0DB2_D1E4;

/// Protocol version carried in every header.
pub const PROTOCOL_VERSION: i16 = 0x0300;

/// Header size in bytes, length prefix included.
pub const HEADER_SIZE: usize = 58;

/// Offset of the request id within the header.
const REQUEST_ID_OFFSET: usize = 28;

static NEXT_REQUEST_ID: AtomicI64 = AtomicI64::new(1);
static NEXT_SEQUENCE_NO: AtomicI64 = AtomicI64::new(1);

/// Next process-wide request id.
pub fn next_request_id() -> i64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

fn next_sequence_no() -> i64 {
    NEXT_SEQUENCE_NO.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// VerbId - 메시지 종류
// ============================================================================

/// Message verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerbId {
    Ping,
    HandShakeRequest,
    HandShakeResponse,
    AuthenticateRequest,
    AuthenticateResponse,
    BeginTransactionRequest,
    BeginTransactionResponse,
    CommitTransactionRequest,
    CommitTransactionResponse,
    RollbackTransactionRequest,
    RollbackTransactionResponse,
    QueryRequest,
    QueryResponse,
    TraverseRequest,
    TraverseResponse,
    AdminRequest,
    AdminResponse,
    MetadataRequest,
    MetadataResponse,
    GetEntityRequest,
    GetEntityResponse,
    GetLargeObjectRequest,
    GetLargeObjectResponse,
    DumpStacktraceRequest,
    DisconnectChannelRequest,
    SessionForcefullyTerminated,
    DecryptBufferRequest,
    DecryptBufferResponse,
    Exception,
}

impl VerbId {
    /// Map a wire id; unknown ids are an error.
    pub fn from_i16(value: i16) -> ProtocolResult<Self> {
        let verb = match value {
            0 => Self::Ping,
            1 => Self::HandShakeRequest,
            2 => Self::HandShakeResponse,
            3 => Self::AuthenticateRequest,
            4 => Self::AuthenticateResponse,
            5 => Self::BeginTransactionRequest,
            6 => Self::BeginTransactionResponse,
            7 => Self::CommitTransactionRequest,
            8 => Self::CommitTransactionResponse,
            9 => Self::RollbackTransactionRequest,
            10 => Self::RollbackTransactionResponse,
            11 => Self::QueryRequest,
            12 => Self::QueryResponse,
            13 => Self::TraverseRequest,
            14 => Self::TraverseResponse,
            15 => Self::AdminRequest,
            16 => Self::AdminResponse,
            19 => Self::MetadataRequest,
            20 => Self::MetadataResponse,
            21 => Self::GetEntityRequest,
            22 => Self::GetEntityResponse,
            23 => Self::GetLargeObjectRequest,
            24 => Self::GetLargeObjectResponse,
            39 => Self::DumpStacktraceRequest,
            40 => Self::DisconnectChannelRequest,
            41 => Self::SessionForcefullyTerminated,
            44 => Self::DecryptBufferRequest,
            45 => Self::DecryptBufferResponse,
            100 => Self::Exception,
            other => return Err(ProtocolError::InvalidVerb(other)),
        };
        Ok(verb)
    }

    pub fn as_i16(self) -> i16 {
        match self {
            Self::Ping => 0,
            Self::HandShakeRequest => 1,
            Self::HandShakeResponse => 2,
            Self::AuthenticateRequest => 3,
            Self::AuthenticateResponse => 4,
            Self::BeginTransactionRequest => 5,
            Self::BeginTransactionResponse => 6,
            Self::CommitTransactionRequest => 7,
            Self::CommitTransactionResponse => 8,
            Self::RollbackTransactionRequest => 9,
            Self::RollbackTransactionResponse => 10,
            Self::QueryRequest => 11,
            Self::QueryResponse => 12,
            Self::TraverseRequest => 13,
            Self::TraverseResponse => 14,
            Self::AdminRequest => 15,
            Self::AdminResponse => 16,
            Self::MetadataRequest => 19,
            Self::MetadataResponse => 20,
            Self::GetEntityRequest => 21,
            Self::GetEntityResponse => 22,
            Self::GetLargeObjectRequest => 23,
            Self::GetLargeObjectResponse => 24,
            Self::DumpStacktraceRequest => 39,
            Self::DisconnectChannelRequest => 40,
            Self::SessionForcefullyTerminated => 41,
            Self::DecryptBufferRequest => 44,
            Self::DecryptBufferResponse => 45,
            Self::Exception => 100,
        }
    }

    /// Frames the server may push without a matching request.
    pub fn is_unsolicited(self) -> bool {
        matches!(
            self,
            Self::Ping | Self::SessionForcefullyTerminated | Self::DisconnectChannelRequest
        )
    }
}

impl fmt::Display for VerbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_i16())
    }
}

// ============================================================================
// MessageHeader - 메시지 헤더
// ============================================================================

/// Fixed-layout header preceding every payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub verb: VerbId,
    pub sequence_no: i64,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    /// Correlation id echoed by the server
    pub request_id: i64,
    pub auth_token: i64,
    pub session_id: i64,
    pub tenant_id: i32,
}

impl MessageHeader {
    /// Header with a fresh sequence number and timestamp.
    pub fn new(verb: VerbId, request_id: i64) -> Self {
        Self {
            verb,
            sequence_no: next_sequence_no(),
            timestamp: Utc::now().timestamp_millis(),
            request_id,
            auth_token: 0,
            session_id: 0,
            tenant_id: 0,
        }
    }

    /// Stamp session credentials.
    pub fn with_session(mut self, auth_token: i64, session_id: i64, tenant_id: i32) -> Self {
        self.auth_token = auth_token;
        self.session_id = session_id;
        self.tenant_id = tenant_id;
        self
    }

    /// Write the header with a zero length placeholder at offset 0.
    pub fn write(&self, out: &mut OutputStream) {
        out.write_i32(0);
        out.write_i32(MAGIC);
        out.write_i16(PROTOCOL_VERSION);
        out.write_i16(self.verb.as_i16());
        out.write_i64(self.sequence_no);
        out.write_i64(self.timestamp);
        out.write_i64(self.request_id);
        out.write_i64(self.auth_token);
        out.write_i64(self.session_id);
        out.write_i32(self.tenant_id);
        out.write_i16(HEADER_SIZE as i16);
    }

    /// Read a header, validating the length prefix against the input.
    ///
    /// Leaves the stream positioned at the payload.
    pub fn read(input: &mut InputStream) -> ProtocolResult<Self> {
        let declared = input.read_i32()?;
        if declared < 0 || declared as usize != input.len() {
            return Err(ProtocolError::LengthMismatch {
                declared: declared.max(0) as usize,
                actual: input.len(),
            });
        }

        let magic = input.read_i32()?;
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }
        let version = input.read_i16()?;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::malformed(format!(
                "unsupported protocol version 0x{:04X}",
                version
            )));
        }

        let verb = VerbId::from_i16(input.read_i16()?)?;
        let header = Self {
            verb,
            sequence_no: input.read_i64()?,
            timestamp: input.read_i64()?,
            request_id: input.read_i64()?,
            auth_token: input.read_i64()?,
            session_id: input.read_i64()?,
            tenant_id: input.read_i32()?,
        };

        let data_offset = input.read_i16()?;
        if data_offset < HEADER_SIZE as i16 {
            return Err(ProtocolError::malformed(format!(
                "data offset {} inside header",
                data_offset
            )));
        }
        input.set_position(data_offset as usize)?;
        Ok(header)
    }

    /// Read only the verb and request id of a raw frame.
    pub fn peek_route(frame: &[u8]) -> ProtocolResult<(VerbId, i64)> {
        if frame.len() < HEADER_SIZE {
            return Err(ProtocolError::UnexpectedEof {
                needed: HEADER_SIZE,
                available: frame.len(),
            });
        }
        let verb = i16::from_be_bytes([frame[10], frame[11]]);
        let mut id = [0u8; 8];
        id.copy_from_slice(&frame[REQUEST_ID_OFFSET..REQUEST_ID_OFFSET + 8]);
        Ok((VerbId::from_i16(verb)?, i64::from_be_bytes(id)))
    }
}
