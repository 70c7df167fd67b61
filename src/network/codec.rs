use crate::network::message::WireMessage;
use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Largest frame accepted from a peer. A bundle holds at most one vote per peer
/// and hash, so this is generous.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Thin wrapper that produces/consumes raw bytes frames via LengthDelimitedCodec.
/// WireMessage (de)serialization is done with bincode, see `encode_message`.
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder().max_frame_length(MAX_FRAME_LEN).new_codec(),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(buf) => Ok(Some(buf.freeze())),
            None => Ok(None),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(item, dst)
    }
}

pub fn encode_message(msg: &WireMessage) -> crate::utils::Result<Bytes> {
    Ok(Bytes::from(bincode::serialize(msg)?))
}

pub fn decode_message(frame: &[u8]) -> crate::utils::Result<WireMessage> {
    Ok(bincode::deserialize(frame)?)
}
