//! Wire protocol error types.

use std::fmt;
use std::io;

/// Result type for wire-level operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Wire protocol errors.
#[derive(Debug)]
pub enum ProtocolError {
    /// I/O error on the underlying transport
    Io(io::Error),

    /// Input ended before a complete value was read
    UnexpectedEof { needed: usize, available: usize },

    /// Structurally invalid payload
    Malformed(String),

    /// Verb id not known to this client
    InvalidVerb(i16),

    /// Frame header carried the wrong magic number
    BadMagic(i32),

    /// Declared length disagrees with the bytes present
    LengthMismatch { declared: usize, actual: usize },

    /// UTF string exceeds the u16 length prefix
    StringTooLong(usize),

    /// VarLong encoding only covers non-negative values
    NegativeVarLong(i64),

    /// Patch write outside the bytes written so far
    PositionOutOfRange { position: usize, len: usize },

    /// Frame exceeds the configured maximum
    FrameTooLarge { size: usize, max: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
            ProtocolError::UnexpectedEof { needed, available } => write!(
                f,
                "Unexpected end of stream: needed {} bytes, {} available",
                needed, available
            ),
            ProtocolError::Malformed(msg) => write!(f, "Malformed payload: {}", msg),
            ProtocolError::InvalidVerb(v) => write!(f, "Invalid verb id: {}", v),
            ProtocolError::BadMagic(m) => write!(f, "Bad magic number: 0x{:08X}", m),
            ProtocolError::LengthMismatch { declared, actual } => write!(
                f,
                "Length mismatch: declared {} bytes, found {}",
                declared, actual
            ),
            ProtocolError::StringTooLong(len) => {
                write!(f, "String too long: {} bytes (max: {})", len, u16::MAX)
            }
            ProtocolError::NegativeVarLong(v) => {
                write!(f, "Cannot encode negative value {} as VarLong", v)
            }
            ProtocolError::PositionOutOfRange { position, len } => write!(
                f,
                "Position {} out of range for buffer of {} bytes",
                position, len
            ),
            ProtocolError::FrameTooLarge { size, max } => {
                write!(f, "Frame too large: {} bytes (max: {})", size, max)
            }
        }
    }
}

impl ProtocolError {
    /// Shorthand for a malformed-payload error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        ProtocolError::Malformed(msg.into())
    }

    /// Whether the error came from the transport rather than the bytes.
    pub fn is_transport(&self) -> bool {
        matches!(self, ProtocolError::Io(_))
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        ProtocolError::Io(err)
    }
}
