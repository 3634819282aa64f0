//! Frame codec for tokio_util.
//!
//! A frame is an i32 total length (covering itself), the fixed
//! [`MessageHeader`] and a verb-specific payload. The decoder splits the byte
//! stream on the length prefix and decodes the header only; the payload stays
//! raw so the channel can route it before anyone parses it.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::{ProtocolError, ProtocolResult};
use super::header::{MessageHeader, HEADER_SIZE};
use super::stream::{InputStream, OutputStream};

/// Default maximum frame size (16MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// Frame
// ============================================================================

/// Decoded header plus raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: MessageHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(header: MessageHeader, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// Parse one complete frame.
    pub fn decode(bytes: Bytes) -> ProtocolResult<Self> {
        let mut input = InputStream::new(bytes);
        let header = MessageHeader::read(&mut input)?;
        Ok(Self {
            header,
            payload: input.remaining_bytes(),
        })
    }

    /// Serialize: header placeholder, payload, then the patched length.
    pub fn encode(&self) -> ProtocolResult<Bytes> {
        let mut out = OutputStream::with_capacity(HEADER_SIZE + self.payload.len());
        self.header.write(&mut out);
        out.write_raw(&self.payload);
        out.patch_length_at(0)?;
        Ok(out.freeze())
    }

    /// Total encoded size.
    pub fn len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Reader positioned at the start of the payload.
    pub fn payload_stream(&self) -> InputStream {
        InputStream::new(self.payload.clone())
    }
}

// ============================================================================
// FrameCodec
// ============================================================================

/// Length-prefixed frame codec.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the default frame limit.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a codec with a custom frame limit.
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let declared = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if declared < HEADER_SIZE as i32 {
            return Err(ProtocolError::LengthMismatch {
                declared: declared.max(0) as usize,
                actual: HEADER_SIZE,
            });
        }
        let size = declared as usize;
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }

        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        let bytes = src.split_to(size).freeze();
        Frame::decode(bytes).map(Some)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }
        dst.extend_from_slice(&item.encode()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::header::VerbId;
    use bytes::BufMut;

    fn frame(verb: VerbId, request_id: i64, payload: &[u8]) -> Frame {
        Frame::new(
            MessageHeader::new(verb, request_id),
            Bytes::copy_from_slice(payload),
        )
    }

    #[test]
    fn test_encode_decode_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let sent = frame(VerbId::QueryRequest, 5, b"payload");
        codec.encode(sent.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 7);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, sent);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(frame(VerbId::Ping, 1, &[1, 2, 3]), &mut buf)
            .unwrap();
        let full = buf.clone();

        let mut partial = BytesMut::from(&full[..2]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let mut partial = BytesMut::from(&full[..HEADER_SIZE]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let mut complete = full;
        let decoded = codec.decode(&mut complete).unwrap().unwrap();
        assert_eq!(&decoded.payload[..], &[1, 2, 3]);
    }

    #[test]
    fn test_multiple_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        for id in 1..=3 {
            codec.encode(frame(VerbId::Ping, id, &[]), &mut buf).unwrap();
        }

        for id in 1..=3 {
            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded.header.request_id, id);
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_frame_too_large() {
        let mut codec = FrameCodec::with_max_size(100);
        let mut buf = BytesMut::new();
        buf.put_i32(200);
        buf.extend_from_slice(&[0u8; 60]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { size: 200, max: 100 })));

        let big = frame(VerbId::Ping, 1, &[0u8; 64]);
        assert!(codec.encode(big, &mut BytesMut::new()).is_err());
    }

    #[test]
    fn test_length_below_header() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_i32(10);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::LengthMismatch { .. })
        ));
    }
}
