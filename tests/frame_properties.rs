#![allow(
    unfulfilled_lint_expectations,
    reason = "test lint expectations may not all trigger"
)]
#![expect(missing_docs, reason = "test file")]
#![expect(clippy::expect_used, reason = "test assertions")]

//! Property tests for router framing.

use bytes::BytesMut;
use proptest::prelude::*;
use ustrouter_connector::frame::{RouterCodec, decode_long, decode_short, encode_long, encode_short};

fn field_lists() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[^\\x00]{0,24}", 0..12)
}

proptest! {
    /// Any NUL-free field list survives a short-frame round trip.
    #[test]
    fn short_round_trip(fields in field_lists()) {
        let encoded = encode_short(&fields).expect("fits in a short frame");
        let mut buf = BytesMut::from(encoded.as_ref());
        prop_assert_eq!(decode_short(&mut buf), Some(fields));
        prop_assert!(buf.is_empty());
    }

    /// Any byte string survives a long-frame round trip.
    #[test]
    fn long_round_trip(payload in prop::collection::vec(any::<u8>(), 0..4096)) {
        let encoded = encode_long(&payload).expect("fits in a long frame");
        let mut buf = BytesMut::from(encoded.as_ref());
        let decoded = decode_long(&mut buf).expect("complete frame");
        prop_assert_eq!(decoded.to_vec(), payload);
        prop_assert!(buf.is_empty());
    }

    /// Splitting a frame anywhere yields it only once both halves arrive.
    #[test]
    fn split_delivery(fields in field_lists(), cut in any::<prop::sample::Index>()) {
        let encoded = encode_short(&fields).expect("fits in a short frame");
        let at = cut.index(encoded.len() + 1);
        let (head, tail) = encoded.split_at(at);
        let mut codec = RouterCodec::new();
        let early = codec.push(head);
        let late = codec.push(tail);
        if tail.is_empty() {
            prop_assert_eq!(early, vec![fields]);
            prop_assert!(late.is_empty());
        } else {
            prop_assert!(early.is_empty());
            prop_assert_eq!(late, vec![fields]);
        }
        prop_assert_eq!(codec.buffered(), 0);
    }
}
