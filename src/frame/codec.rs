//! Encoders and the incremental decoder for router frames.
//!
//! Every short-frame field is written followed by a NUL terminator, so
//! `["init", "web1"]` travels as `init\0web1\0`. Decoding splits on NUL and
//! drops the empty tail left by the final terminator, which also accepts
//! payloads whose last field is unterminated.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{
    FIELD_TERMINATOR,
    Fields,
    FrameError,
    LONG_HEADER_LEN,
    MAX_LONG_PAYLOAD,
    MAX_SHORT_PAYLOAD,
    SHORT_HEADER_LEN,
};

/// A single frame queued for the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Command or control message carried as a short frame.
    Short(Fields),
    /// Raw payload carried as a long frame.
    Long(Bytes),
}

impl Outbound {
    /// Build a short frame from any list of string-like fields.
    #[must_use]
    pub fn short<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Short(fields.into_iter().map(Into::into).collect())
    }

    /// Build a long frame carrying a copy of `payload`.
    #[must_use]
    pub fn long(payload: impl AsRef<[u8]>) -> Self {
        Self::Long(Bytes::copy_from_slice(payload.as_ref()))
    }
}

/// Encode `fields` as a short frame.
///
/// # Errors
/// Returns [`FrameError::PayloadTooLarge`] when the terminated fields exceed
/// [`MAX_SHORT_PAYLOAD`] bytes.
pub fn encode_short<S: AsRef<str>>(fields: &[S]) -> Result<Bytes, FrameError> {
    let mut dst = BytesMut::new();
    put_short(fields, &mut dst)?;
    Ok(dst.freeze())
}

/// Encode `payload` as a long frame.
///
/// # Errors
/// Returns [`FrameError::PayloadTooLarge`] when the payload length does not
/// fit the 4-byte header.
pub fn encode_long(payload: &[u8]) -> Result<Bytes, FrameError> {
    let mut dst = BytesMut::new();
    put_long(payload, &mut dst)?;
    Ok(dst.freeze())
}

fn put_short<S: AsRef<str>>(fields: &[S], dst: &mut BytesMut) -> Result<(), FrameError> {
    let payload_len: usize = fields.iter().map(|field| field.as_ref().len() + 1).sum();
    let len = u16::try_from(payload_len).map_err(|_| FrameError::PayloadTooLarge {
        len: payload_len,
        max: MAX_SHORT_PAYLOAD,
    })?;
    dst.reserve(SHORT_HEADER_LEN + payload_len);
    dst.put_u16(len);
    for field in fields {
        dst.put_slice(field.as_ref().as_bytes());
        dst.put_u8(FIELD_TERMINATOR);
    }
    Ok(())
}

fn put_long(payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        len: payload.len(),
        max: MAX_LONG_PAYLOAD,
    })?;
    dst.reserve(LONG_HEADER_LEN + payload.len());
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Split a short-frame payload into its fields.
///
/// An empty payload yields no fields. A single trailing terminator is
/// consumed rather than producing an empty final field.
#[must_use]
pub fn split_fields(payload: &[u8]) -> Fields {
    if payload.is_empty() {
        return Vec::new();
    }
    let body = payload
        .strip_suffix(&[FIELD_TERMINATOR])
        .unwrap_or(payload);
    body.split(|byte| *byte == FIELD_TERMINATOR)
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Remove one complete short frame from the front of `src`.
///
/// Returns `None` without consuming anything when `src` does not yet hold the
/// full header and payload.
pub fn decode_short(src: &mut BytesMut) -> Option<Fields> {
    let mut header = src.get(..SHORT_HEADER_LEN)?;
    let frame_len = SHORT_HEADER_LEN + usize::from(header.get_u16());
    if src.len() < frame_len {
        src.reserve(frame_len - src.len());
        return None;
    }
    src.advance(SHORT_HEADER_LEN);
    let payload = src.split_to(frame_len - SHORT_HEADER_LEN);
    Some(split_fields(&payload))
}

/// Remove one complete long frame from the front of `src`.
///
/// Returns `None` without consuming anything when `src` does not yet hold the
/// full header and payload.
pub fn decode_long(src: &mut BytesMut) -> Option<Bytes> {
    let mut header = src.get(..LONG_HEADER_LEN)?;
    let len = usize::try_from(header.get_u32()).ok()?;
    let frame_len = LONG_HEADER_LEN.checked_add(len)?;
    if src.len() < frame_len {
        return None;
    }
    src.advance(LONG_HEADER_LEN);
    Some(src.split_to(len).freeze())
}

/// Codec for the client side of a router connection.
///
/// Outbound frames of either variant are encoded through [`Encoder`]. Inbound
/// bytes are accumulated in an internal buffer by [`RouterCodec::push`], which
/// yields every short frame completed by the new chunk. The same decoding is
/// available through [`Decoder`] for use with
/// [`tokio_util::codec::FramedRead`].
#[derive(Debug, Default)]
pub struct RouterCodec {
    inbound: BytesMut,
}

impl RouterCodec {
    /// Create a codec with an empty decode buffer.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append `chunk` to the decode buffer and return all completed frames.
    ///
    /// Partial frames stay buffered until a later call completes them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Fields> {
        self.inbound.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(fields) = decode_short(&mut self.inbound) {
            frames.push(fields);
        }
        frames
    }

    /// Number of bytes waiting for the rest of their frame.
    #[must_use]
    pub fn buffered(&self) -> usize { self.inbound.len() }

    /// Discard any partially received frame.
    pub fn reset(&mut self) { self.inbound.clear(); }
}

impl Decoder for RouterCodec {
    type Error = FrameError;
    type Item = Fields;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(decode_short(src))
    }
}

impl Encoder<Outbound> for RouterCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Outbound::Short(fields) => put_short(&fields, dst),
            Outbound::Long(payload) => put_long(&payload, dst),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use rstest::rstest;
    use tokio_util::codec::FramedRead;

    use super::*;

    #[rstest]
    #[case::greeting(&["version", "1"], b"\x00\x0aversion\x001\x00".as_slice())]
    #[case::init(&["init", "web1"], b"\x00\x0ainit\x00web1\x00".as_slice())]
    #[case::trailing_empty(&["true", ""], b"\x00\x06true\x00\x00".as_slice())]
    #[case::no_fields(&[], b"\x00\x00".as_slice())]
    fn encodes_short_frames(#[case] fields: &[&str], #[case] expected: &[u8]) {
        let bytes = encode_short(fields).expect("encode");
        assert_eq!(bytes.as_ref(), expected);
    }

    #[rstest]
    fn short_length_counts_bytes_not_fields() {
        let bytes = encode_short(&["h\u{e9}"]).expect("encode");
        assert_eq!(bytes.get(..2), Some(&[0u8, 4][..]));
    }

    #[rstest]
    fn encodes_long_frame() {
        let bytes = encode_long(b"secret").expect("encode");
        assert_eq!(bytes.as_ref(), b"\x00\x00\x00\x06secret");
    }

    #[rstest]
    fn rejects_oversized_short_frame() {
        let field = "x".repeat(MAX_SHORT_PAYLOAD);
        let err = encode_short(&[field]).expect_err("too large");
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { len, max } if len == MAX_SHORT_PAYLOAD + 1 && max == MAX_SHORT_PAYLOAD
        ));
    }

    #[rstest]
    #[case::terminated(b"status\x00ok\x00".as_slice(), &["status", "ok"])]
    #[case::unterminated(b"version\x001".as_slice(), &["version", "1"])]
    #[case::empty_middle(b"a\x00\x00b\x00".as_slice(), &["a", "", "b"])]
    #[case::single_empty(b"\x00".as_slice(), &[""])]
    #[case::empty(b"".as_slice(), &[])]
    fn splits_payload_fields(#[case] payload: &[u8], #[case] expected: &[&str]) {
        assert_eq!(split_fields(payload), expected);
    }

    #[rstest]
    fn push_waits_for_complete_header_and_payload() {
        let mut codec = RouterCodec::new();
        assert!(codec.push(&[0]).is_empty());
        assert!(codec.push(&[6, b's', b't']).is_empty());
        assert_eq!(codec.buffered(), 4);
        let frames = codec.push(b"at\x00\x00");
        assert_eq!(frames, vec![vec!["stat".to_owned(), String::new()]]);
        assert_eq!(codec.buffered(), 0);
    }

    #[rstest]
    fn push_yields_back_to_back_frames_and_keeps_remainder() {
        let mut chunk = BytesMut::new();
        chunk.extend_from_slice(&encode_short(&["status", "ok"]).expect("encode"));
        chunk.extend_from_slice(&encode_short(&["status", "ok", "abc"]).expect("encode"));
        chunk.extend_from_slice(&[0, 9, b'v']);

        let mut codec = RouterCodec::new();
        let frames = codec.push(&chunk);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames.get(1).map(Vec::len), Some(3));
        assert_eq!(codec.buffered(), 3);
    }

    #[rstest]
    fn reset_discards_partial_frame() {
        let mut codec = RouterCodec::new();
        assert!(codec.push(&[0, 10, b'v']).is_empty());
        codec.reset();
        let frames = codec.push(&encode_short(&["version", "1"]).expect("encode"));
        assert_eq!(frames, vec![vec!["version".to_owned(), "1".to_owned()]]);
    }

    #[rstest]
    fn decode_long_leaves_partial_frame_untouched() {
        let mut src = BytesMut::from(&b"\x00\x00\x00\x05abc"[..]);
        assert!(decode_long(&mut src).is_none());
        assert_eq!(src.len(), 7);
        src.extend_from_slice(b"de");
        assert_eq!(decode_long(&mut src).as_deref(), Some(&b"abcde"[..]));
        assert!(src.is_empty());
    }

    #[rstest]
    fn encoder_writes_both_variants() {
        let mut codec = RouterCodec::new();
        let mut dst = BytesMut::new();
        codec
            .encode(Outbound::short(["log", "t1", "k"]), &mut dst)
            .expect("short");
        codec.encode(Outbound::long("line"), &mut dst).expect("long");

        assert_eq!(decode_short(&mut dst), Some(vec![
            "log".to_owned(),
            "t1".to_owned(),
            "k".to_owned()
        ]));
        assert_eq!(decode_long(&mut dst).as_deref(), Some(&b"line"[..]));
        assert!(dst.is_empty());
    }

    #[tokio::test]
    async fn framed_read_decodes_stream() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_short(&["version", "1"]).expect("encode"));
        wire.extend_from_slice(&encode_short(&["status", "ok"]).expect("encode"));

        let mut frames = FramedRead::new(wire.as_slice(), RouterCodec::new());
        let first = frames.next().await.expect("first").expect("decode");
        let second = frames.next().await.expect("second").expect("decode");

        assert_eq!(first, vec!["version".to_owned(), "1".to_owned()]);
        assert_eq!(second, vec!["status".to_owned(), "ok".to_owned()]);
        assert!(frames.next().await.is_none());
    }
}
