//! Framing for the combined output channel.
//!
//! A started runtime emits stdout and stderr as one interleaved byte
//! channel. Each frame is an 8-byte header followed by the payload: byte 0
//! carries the stream tag, bytes 1-3 are reserved (zero), bytes 4-7 hold the
//! payload length as a big-endian `u32`. Payload bytes are opaque; text
//! decoding happens only after the streams have been split, so frame
//! boundaries can never fall inside a partially decoded character.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Which logical stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTag {
    /// Standard output of the sandboxed process.
    Stdout,
    /// Standard error of the sandboxed process.
    Stderr,
}

impl StreamTag {
    /// Wire value of this tag.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Stdout => 1,
            Self::Stderr => 2,
        }
    }

    /// Parse a wire value.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Stream the payload belongs to.
    pub tag: StreamTag,
    /// Payload length in bytes.
    pub len: usize,
}

/// Errors produced while decoding a frame header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The stream tag byte is not a known stream.
    #[error("unknown stream tag {0:#x}")]
    UnknownTag(u8),
}

/// Encode one frame (header + payload) ready to be written to the combined
/// channel.
pub fn encode(tag: StreamTag, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(tag.as_byte());
    buf.put_bytes(0, 3);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode a frame header from exactly [`HEADER_LEN`] bytes.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> std::result::Result<FrameHeader, FrameError> {
    let tag = StreamTag::from_byte(header[0]).ok_or(FrameError::UnknownTag(header[0]))?;
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    Ok(FrameHeader { tag, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = encode(StreamTag::Stdout, b"hello");
        assert_eq!(frame.len(), HEADER_LEN + 5);
        assert_eq!(frame[0], 1);
        assert_eq!(&frame[1..4], &[0, 0, 0]);
        assert_eq!(&frame[4..8], &5u32.to_be_bytes());
        assert_eq!(&frame[8..], b"hello");
    }

    #[test]
    fn test_roundtrip() {
        let frame = encode(StreamTag::Stderr, b"oops");
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&frame[..HEADER_LEN]);
        let decoded = decode_header(&header).unwrap();
        assert_eq!(decoded.tag, StreamTag::Stderr);
        assert_eq!(decoded.len, 4);
    }

    #[test]
    fn test_empty_payload() {
        let frame = encode(StreamTag::Stdout, b"");
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&frame[..HEADER_LEN]);
        assert_eq!(decode_header(&header).unwrap().len, 0);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let header = [9u8, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(decode_header(&header), Err(FrameError::UnknownTag(9)));
    }
}
