//! Manager stream framing
//!
//! Splits the raw byte stream into complete `Key: Value` blocks and parses
//! them into [`AmiMessage`]s. The decoder is stateless beyond the buffer the
//! framing layer owns, so it survives messages fragmented across reads and
//! multiple messages arriving in one read.

use crate::constants::TERMINATOR;
use crate::message::{AmiAction, AmiMessage};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Codec for the manager's line-oriented field-block protocol
#[derive(Debug, Default, Clone, Copy)]
pub struct AmiCodec;

/// Find the first occurrence of the block terminator in `haystack`
fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(TERMINATOR.len())
        .position(|w| w == TERMINATOR)
}

impl Decoder for AmiCodec {
    type Item = AmiMessage;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(pos) = find_terminator(src) else {
            return Ok(None);
        };

        let block = src.split_to(pos + TERMINATOR.len());
        let text = String::from_utf8_lossy(&block[..pos]);

        Ok(Some(AmiMessage::parse(&text)))
    }
}

impl Encoder<AmiAction> for AmiCodec {
    type Error = std::io::Error;

    fn encode(&mut self, action: AmiAction, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(action.to_wire().as_bytes());
        Ok(())
    }
}
