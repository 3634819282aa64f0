//! # Wire Protocol
//!
//! Binary protocol spoken between the client and the graph server.
//!
//! ## Overview
//!
//! - **Streams** - big-endian reader/writer with patchable lengths and compact longs
//! - **Header** - fixed 58-byte message header and verb ids
//! - **Codec** - length-prefixed framing for Tokio
//! - **Messages** - request/response payloads per verb
//! - **Graph** - entity records and the reference-map entity stream decoder
//!
//! ## Note
//!
//! Most users should use the high-level [`crate::driver`] module instead of
//! interacting with the protocol directly.

pub mod codec;
pub mod error;
pub mod graph;
pub mod header;
pub mod message;
pub mod stream;

pub use codec::{Frame, FrameCodec, DEFAULT_MAX_FRAME_SIZE};
pub use error::{ProtocolError, ProtocolResult};
pub use graph::{decode_entity_stream, DecodedGraph};
pub use header::{next_request_id, MessageHeader, VerbId, HEADER_SIZE, MAGIC, PROTOCOL_VERSION};
pub use message::{Request, Response};
pub use stream::{InputStream, OutputStream, ReferenceMap, VAR_LONG_NULL};
