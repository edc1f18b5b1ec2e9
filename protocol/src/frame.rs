//! The outermost transport envelope: tags a [`ServiceRequest`]/
//! [`ServiceResponse`] with a correlation id so many concurrent requests can
//! share one connection.
//!
//! Wire layout per frame, after the length-delimited prefix added by
//! [`crate::codec::WireCodec`]: `[type:1][correlation_id:8][body]`. The
//! `type` byte distinguishes a request from the three ways a response can
//! conclude a stream, the same way the Connect RPC envelope uses a flags
//! byte to distinguish a message frame from an end-of-stream frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use replica_client_std::errors::EnvelopeError;

/// Unique identifier for one in-flight request, scoped to the lifetime of a
/// single `Transport` connection.
pub type CorrelationId = u64;

const REQUEST: u8 = 0x0;
const RESPONSE: u8 = 0x1;
const STREAM_RESPONSE: u8 = 0x2;
const STREAM_END: u8 = 0x3;
const STREAM_ERROR: u8 = 0x4;

/// A single framed message on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Client → server: an encoded [`crate::envelope::ServiceRequest`].
    Request(CorrelationId, Bytes),
    /// Server → client: an encoded [`crate::envelope::ServiceResponse`] for a
    /// unary call.
    Response(CorrelationId, Bytes),
    /// Server → client: one encoded [`crate::envelope::ServiceResponse`]
    /// frame belonging to an open stream. Zero or more of these precede a
    /// `StreamEnd` or `StreamError`.
    StreamResponse(CorrelationId, Bytes),
    /// Server → client: the stream completed successfully; no further
    /// frames will arrive for this correlation id.
    StreamEnd(CorrelationId),
    /// Server → client: the stream terminated with a transport-level error.
    /// The body carries a human-readable cause, independent of any
    /// application-tagged error carried inside a `ServiceResponse`.
    StreamError(CorrelationId, Bytes),
}

impl Frame {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Frame::Request(id, _)
            | Frame::Response(id, _)
            | Frame::StreamResponse(id, _)
            | Frame::StreamEnd(id)
            | Frame::StreamError(id, _) => *id,
        }
    }

    fn frame_type(&self) -> u8 {
        match self {
            Frame::Request(..) => REQUEST,
            Frame::Response(..) => RESPONSE,
            Frame::StreamResponse(..) => STREAM_RESPONSE,
            Frame::StreamEnd(..) => STREAM_END,
            Frame::StreamError(..) => STREAM_ERROR,
        }
    }

    fn body(&self) -> &[u8] {
        match self {
            Frame::Request(_, body)
            | Frame::Response(_, body)
            | Frame::StreamResponse(_, body)
            | Frame::StreamError(_, body) => body,
            Frame::StreamEnd(_) => &[],
        }
    }

    pub fn encoded_len(&self) -> usize {
        1 + 8 + self.body().len()
    }

    pub fn write_to_bytes(&self, dst: &mut BytesMut) {
        dst.put_u8(self.frame_type());
        dst.put_u64(self.correlation_id());
        dst.extend_from_slice(self.body());
    }
}

impl TryFrom<BytesMut> for Frame {
    type Error = EnvelopeError;

    fn try_from(mut src: BytesMut) -> Result<Self, Self::Error> {
        if src.len() < 9 {
            return Err(EnvelopeError::Malformed(format!(
                "frame header requires 9 bytes, got {}",
                src.len()
            )));
        }

        let frame_type = src.get_u8();
        let correlation_id = src.get_u64();
        let body = src.freeze();

        let frame = match frame_type {
            REQUEST => Frame::Request(correlation_id, body),
            RESPONSE => Frame::Response(correlation_id, body),
            STREAM_RESPONSE => Frame::StreamResponse(correlation_id, body),
            STREAM_END => Frame::StreamEnd(correlation_id),
            STREAM_ERROR => Frame::StreamError(correlation_id, body),
            other => {
                return Err(EnvelopeError::Malformed(format!(
                    "unknown frame type: {other:#x}"
                )))
            }
        };

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_request_frame() {
        let frame = Frame::Request(42, Bytes::from_static(b"\x01\x02"));
        let mut buf = BytesMut::new();
        frame.write_to_bytes(&mut buf);

        let decoded = Frame::try_from(buf).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn stream_end_carries_no_body() {
        let frame = Frame::StreamEnd(7);
        let mut buf = BytesMut::new();
        frame.write_to_bytes(&mut buf);
        assert_eq!(buf.len(), 9);

        let decoded = Frame::try_from(buf).unwrap();
        assert_eq!(decoded, Frame::StreamEnd(7));
    }

    #[test]
    fn rejects_short_header() {
        let buf = BytesMut::from(&b"\x00\x01"[..]);
        assert!(Frame::try_from(buf).is_err());
    }
}
