use bytes::{Buf, BufMut, BytesMut};
use replica_client_std::errors::EnvelopeError;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::Frame;

/// Default cap on a single frame's wire size.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

const LENGTH_PREFIX_LEN: usize = 4;

/// `tokio_util::codec` [`Encoder`]/[`Decoder`] pair for [`Frame`], used with
/// `Framed` to turn any `AsyncRead + AsyncWrite` connection into a
/// `Stream<Item = Result<Frame, _>> + Sink<Frame, _>`.
///
/// Frames are length-delimited: a 4-byte big-endian length prefix, then the
/// frame body produced by [`Frame::write_to_bytes`]. This codec enforces no
/// sequencing state machine: requests and responses for many correlation ids
/// are expected to interleave freely on a single connection.
pub struct WireCodec {
    max_frame_size: usize,
}

impl WireCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Encoder<Frame> for WireCodec {
    type Error = EnvelopeError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = item.encoded_len();
        if len > self.max_frame_size {
            return Err(EnvelopeError::FrameTooLarge(len, self.max_frame_size));
        }

        dst.reserve(LENGTH_PREFIX_LEN + len);
        dst.put_u32(len as u32);
        item.write_to_bytes(dst);

        Ok(())
    }
}

impl Decoder for WireCodec {
    type Item = Frame;
    type Error = EnvelopeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let len = u32::from_be_bytes(src[..LENGTH_PREFIX_LEN].try_into().unwrap()) as usize;
        if len > self.max_frame_size {
            return Err(EnvelopeError::FrameTooLarge(len, self.max_frame_size));
        }

        if src.len() < LENGTH_PREFIX_LEN + len {
            src.reserve(LENGTH_PREFIX_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let frame_bytes = src.split_to(len);

        Frame::try_from(frame_bytes).map(Some)
    }
}
