//! Request and response payloads.
//!
//! Every request type knows its verb and how to write its payload; every
//! response type knows how to read its payload back. Headers are handled
//! separately (see [`MessageHeader`]) so the channel can route a frame
//! before its payload is parsed.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;

use super::codec::Frame;
use super::error::{ProtocolError, ProtocolResult};
use super::header::{MessageHeader, VerbId};
use super::stream::{InputStream, OutputStream};

/// Commit section opcodes.
pub mod opcode {
    /// New attribute descriptors (request) / descriptor id map (response)
    pub const DESCRIPTORS: u16 = 0x1010;
    /// Added entities / added id map
    pub const ADDED: u16 = 0x1011;
    /// Changed entities / new versions
    pub const CHANGED: u16 = 0x1012;
    /// Removed entity ids
    pub const REMOVED: u16 = 0x1013;
    /// Server debug dump, ignored by the client
    pub const DEBUG: u16 = 0x6789;
}

/// Transaction status codes reported by commit.
pub mod tx_status {
    pub const SUCCESS: i32 = 0;
    pub const ALREADY_IN_PROGRESS: i32 = 8001;
    pub const CLIENT_DISCONNECTED: i32 = 8002;
    pub const MALFORMED: i32 = 8003;
    pub const GENERAL_ERROR: i32 = 8004;
    pub const VERIFICATION_ERROR: i32 = 8005;
    pub const IN_BAD_STATE: i32 = 8006;
    pub const UNIQUE_CONSTRAINT_VIOLATION: i32 = 8007;
    pub const OPTIMISTIC_LOCK_FAILED: i32 = 8008;
    pub const RESOURCE_EXCEEDED: i32 = 8009;
    pub const CURRENT_THREAD_NOT_IN_TRANSACTION: i32 = 8010;
    pub const UNIQUE_INDEX_KEY_ATTRIBUTE_NULL: i32 = 8011;

    /// Human-readable name of a status code.
    pub fn describe(code: i32) -> &'static str {
        match code {
            SUCCESS => "Success",
            ALREADY_IN_PROGRESS => "AlreadyInProgress",
            CLIENT_DISCONNECTED => "ClientDisconnected",
            MALFORMED => "MalFormed",
            GENERAL_ERROR => "GeneralError",
            VERIFICATION_ERROR => "VerificationError",
            IN_BAD_STATE => "InBadState",
            UNIQUE_CONSTRAINT_VIOLATION => "UniqueConstraintViolation",
            OPTIMISTIC_LOCK_FAILED => "OptimisticLockFailed",
            RESOURCE_EXCEEDED => "ResourceExceeded",
            CURRENT_THREAD_NOT_IN_TRANSACTION => "CurrentThreadNotInTransaction",
            UNIQUE_INDEX_KEY_ATTRIBUTE_NULL => "UniqueIndexKeyAttributeNullError",
            _ => "Unknown",
        }
    }
}

/// Client-to-server message.
pub trait Request {
    /// Verb stamped into the header.
    const VERB: VerbId;

    /// Write the payload that follows the header.
    fn write_payload(&self, out: &mut OutputStream) -> ProtocolResult<()>;

    /// Build a frame under the given header.
    fn to_frame(&self, header: MessageHeader) -> ProtocolResult<Frame> {
        let mut out = OutputStream::new();
        self.write_payload(&mut out)?;
        Ok(Frame::new(header, out.freeze()))
    }
}

/// Server-to-client message.
pub trait Response: Sized {
    /// Verb expected in the header.
    const VERB: VerbId;

    /// Read the payload that follows the header.
    fn read_payload(input: &mut InputStream) -> ProtocolResult<Self>;

    /// Parse a frame, checking its verb.
    fn from_frame(frame: &Frame) -> ProtocolResult<Self> {
        if frame.header.verb != Self::VERB {
            return Err(ProtocolError::malformed(format!(
                "expected {}, received {}",
                Self::VERB,
                frame.header.verb
            )));
        }
        Self::read_payload(&mut frame.payload_stream())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(tx_status::describe(8008), "OptimisticLockFailed");
        assert_eq!(tx_status::describe(1), "Unknown");
    }

    #[test]
    fn test_response_verb_checked() {
        let frame = Frame::new(MessageHeader::new(VerbId::QueryResponse, 1), Vec::new());
        assert!(matches!(
            GetEntityResponse::from_frame(&frame),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
