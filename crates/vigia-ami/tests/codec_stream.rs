//! Codec framing under arbitrary read fragmentation
//!
//! The transport may deliver the stream split at any byte boundary,
//! including mid-field and mid-terminator. However the stream is chopped,
//! the decoder must produce exactly the same message sequence as when it is
//! fed whole.

use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::Decoder;
use vigia_ami::codec::AmiCodec;

const STREAM: &[u8] = b"Asterisk Call Manager/5.0\r\n\
    Response: Success\r\nActionID: 1\r\nMessage: Authentication accepted\r\n\r\n\
    Event: Newchannel\r\nUniqueid: 1722900000.1\r\nLinkedid: 1722900000.1\r\n\
    Channel: SIP/999888777-0000001f\r\nContext: from-trunk\r\nCallerIDNum: 999888777\r\n\r\n\
    Event: Newstate\r\nUniqueid: 1722900000.1\r\nChannelState: 6\r\nChannelStateDesc: Up\r\n\r\n\
    Event: Hangup\r\nUniqueid: 1722900000.1\r\nLinkedid: 1722900000.1\r\nCause: 16\r\n\r\n";

/// Feed the chunks through the decoder, collecting every framed message's
/// field list
fn decode_chunks(chunks: &[&[u8]]) -> Vec<Vec<(String, String)>> {
    let mut codec = AmiCodec;
    let mut buf = BytesMut::new();
    let mut out = Vec::new();

    for chunk in chunks {
        buf.extend_from_slice(chunk);
        while let Some(msg) = codec.decode(&mut buf).expect("framing never errors") {
            out.push(msg.fields().to_vec());
        }
    }
    out
}

#[test]
fn whole_stream_decodes_to_four_messages() {
    let messages = decode_chunks(&[STREAM]);
    assert_eq!(messages.len(), 4);
    // the banner line folds into the first block and is ignored as a field
    assert_eq!(messages[0][0], ("Response".to_string(), "Success".to_string()));
    assert_eq!(messages[3][0], ("Event".to_string(), "Hangup".to_string()));
}

proptest! {
    #[test]
    fn fragmentation_never_changes_the_message_sequence(
        mut cuts in prop::collection::vec(1usize..STREAM.len(), 0..8)
    ) {
        cuts.sort_unstable();
        cuts.dedup();

        let mut chunks: Vec<&[u8]> = Vec::new();
        let mut start = 0;
        for cut in cuts {
            chunks.push(&STREAM[start..cut]);
            start = cut;
        }
        chunks.push(&STREAM[start..]);

        prop_assert_eq!(decode_chunks(&chunks), decode_chunks(&[STREAM]));
    }
}

#[test]
fn byte_at_a_time_decoding_matches_whole_stream() {
    let chunks: Vec<&[u8]> = STREAM.chunks(1).collect();
    assert_eq!(decode_chunks(&chunks), decode_chunks(&[STREAM]));
}
