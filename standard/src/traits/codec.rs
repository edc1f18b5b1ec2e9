use bytes::{Bytes, BytesMut};

/// Encodes a typed request item into opaque bytes before it is placed in a
/// `Command`/`Query` envelope's `payload` field.
///
/// The core never inspects the bytes this produces; it is purely a passthrough
/// carrier. Implementors typically wrap a serialization format (`bincode`,
/// `serde_json`, protobuf, ...).
pub trait MessageEncoder<Item> {
    type Error: std::error::Error + Send + Sync + 'static;

    fn encode(&mut self, item: Item) -> Result<Bytes, Self::Error>;
}

/// Decodes opaque `output` bytes from a `CommandResponse`/`QueryResponse`/
/// `StreamResponse` envelope back into a typed item.
pub trait MessageDecoder<Item> {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode(&mut self, bytes: &mut BytesMut) -> Result<Item, Self::Error>;
}

/// A [`MessageEncoder`]/[`MessageDecoder`] pair that round-trips through
/// `bincode`. Useful for tests and for callers who don't need a custom wire
/// format for their operation payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

#[derive(thiserror::Error, Debug)]
pub enum BincodeCodecError {
    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),
    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),
}

impl<T> MessageEncoder<T> for BincodeCodec
where
    T: bincode::Encode,
{
    type Error = BincodeCodecError;

    fn encode(&mut self, item: T) -> Result<Bytes, Self::Error> {
        let bytes = bincode::encode_to_vec(item, bincode::config::standard())?;
        Ok(Bytes::from(bytes))
    }
}

impl<T> MessageDecoder<T> for BincodeCodec
where
    T: bincode::Decode<()>,
{
    type Error = BincodeCodecError;

    fn decode(&mut self, bytes: &mut BytesMut) -> Result<T, Self::Error> {
        let (item, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(item)
    }
}
