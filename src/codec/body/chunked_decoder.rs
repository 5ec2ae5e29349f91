//! Decoder for HTTP chunked transfer encoding.
//!
//! Reassembles a chunked body ([RFC 9112 section
//! 7.1](https://www.rfc-editor.org/rfc/rfc9112.html#name-chunked-transfer-coding))
//! into its payload bytes: a hexadecimal size line, the chunk data, a CRLF
//! terminator, repeated until the zero-size chunk and its trailing empty
//! line.
//!
//! Known limitations, kept deliberately narrow for an upload endpoint:
//!
//! - Chunk extensions (`;` after the size) are not supported. A size line
//!   carrying one fails with [`ParseError::MalformedSizeLine`] rather than
//!   being silently consumed.
//! - Trailer sections are not supported: the zero-size chunk must be
//!   followed by exactly one empty line.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::*;

/// Streaming decoder that turns a chunked-encoded byte stream into
/// [`PayloadItem`]s.
///
/// Chunk data is emitted as it arrives, possibly in several pieces per
/// declared chunk, always in stream order. The zero-size chunk produces
/// [`PayloadItem::Eof`] once its trailing empty line has been consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining: u64,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: Size, remaining: 0 }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// The wire grammar, one state per expected byte class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Accumulating hex digits of the chunk size
    Size,
    /// Linear whitespace between the size and its CR
    SizeLws,
    /// LF completing the size line
    SizeLf,
    /// Chunk data, `remaining` bytes outstanding
    Body,
    /// CR after chunk data
    BodyCr,
    /// LF after chunk data
    BodyLf,
    /// CR of the empty line after the zero-size chunk
    EndCr,
    /// LF of the empty line after the zero-size chunk
    EndLf,
    /// Body complete
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Returns `Ok(Some(Chunk(_)))` for each piece of chunk data,
    /// `Ok(Some(Eof))` once the terminal chunk is fully consumed, and
    /// `Ok(None)` when more input is needed.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!("finished reading chunked body");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            let mut chunk = None;
            match self.state.step(src, &mut self.remaining, &mut chunk)? {
                Some(next_state) => self.state = next_state,
                // need more data
                None => return Ok(None),
            }

            if let Some(bytes) = chunk {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

/// Pops the next byte, or bails out of `step` signalling "need more data".
macro_rules! next_byte {
    ($src:ident) => {{
        if $src.is_empty() {
            return Ok(None);
        }
        $src.get_u8()
    }};
}

impl ChunkedState {
    /// Advances the state machine by one byte (or, in `Body`, by as much
    /// chunk data as the buffer holds). Returns the next state, or `None`
    /// when the buffer ran dry mid-step.
    fn step(
        &self,
        src: &mut BytesMut,
        remaining: &mut u64,
        chunk: &mut Option<Bytes>,
    ) -> Result<Option<ChunkedState>, ParseError> {
        match self {
            Size => ChunkedState::read_size(src, remaining),
            SizeLws => ChunkedState::read_size_lws(src),
            SizeLf => ChunkedState::read_size_lf(src, *remaining),
            Body => ChunkedState::read_body(src, remaining, chunk),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Ok(Some(End)),
        }
    }

    /// Accumulates the chunk size from hexadecimal digits.
    ///
    /// Trailing tabs/spaces before the CR are tolerated, the size being the
    /// trimmed content of the line. Anything else, including the `;` that
    /// would start a chunk extension, fails the size line.
    fn read_size(src: &mut BytesMut, remaining: &mut u64) -> Result<Option<ChunkedState>, ParseError> {
        let digit = |b: u8| -> Option<u64> {
            match b {
                b'0'..=b'9' => Some(u64::from(b - b'0')),
                b'a'..=b'f' => Some(u64::from(b - b'a' + 10)),
                b'A'..=b'F' => Some(u64::from(b - b'A' + 10)),
                _ => None,
            }
        };

        let b = next_byte!(src);
        match b {
            b'\r' => Ok(Some(SizeLf)),
            b'\t' | b' ' => Ok(Some(SizeLws)),
            b';' => Err(ParseError::malformed_size_line("chunk extensions are not supported")),
            _ => match digit(b) {
                Some(value) => {
                    *remaining = remaining
                        .checked_mul(16)
                        .and_then(|size| size.checked_add(value))
                        .ok_or_else(|| ParseError::malformed_size_line("chunk size overflows u64"))?;
                    Ok(Some(Size))
                }
                None => Err(ParseError::malformed_size_line(format!(
                    "invalid byte {b:#04x} in chunk size"
                ))),
            },
        }
    }

    /// Whitespace may pad the size, but no further digits can follow it.
    fn read_size_lws(src: &mut BytesMut) -> Result<Option<ChunkedState>, ParseError> {
        match next_byte!(src) {
            b'\t' | b' ' => Ok(Some(SizeLws)),
            b'\r' => Ok(Some(SizeLf)),
            b';' => Err(ParseError::malformed_size_line("chunk extensions are not supported")),
            b => Err(ParseError::malformed_size_line(format!(
                "invalid byte {b:#04x} after chunk size"
            ))),
        }
    }

    /// LF completing the size line. Size zero marks the terminal chunk.
    fn read_size_lf(src: &mut BytesMut, remaining: u64) -> Result<Option<ChunkedState>, ParseError> {
        match next_byte!(src) {
            b'\n' if remaining == 0 => Ok(Some(EndCr)),
            b'\n' => Ok(Some(Body)),
            _ => Err(ParseError::malformed_size_line("expected LF after chunk size line CR")),
        }
    }

    /// Splits off up to `remaining` bytes of chunk data.
    fn read_body(
        src: &mut BytesMut,
        remaining: &mut u64,
        chunk: &mut Option<Bytes>,
    ) -> Result<Option<ChunkedState>, ParseError> {
        if src.is_empty() {
            return Ok(None);
        }

        let available = u64::try_from(src.len()).unwrap_or(u64::MAX);
        let take = std::cmp::min(*remaining, available) as usize;

        *remaining -= take as u64;
        *chunk = Some(src.split_to(take).freeze());

        if *remaining > 0 { Ok(Some(Body)) } else { Ok(Some(BodyCr)) }
    }

    fn read_body_cr(src: &mut BytesMut) -> Result<Option<ChunkedState>, ParseError> {
        match next_byte!(src) {
            b'\r' => Ok(Some(BodyLf)),
            _ => Err(ParseError::invalid_body("expected CR after chunk data")),
        }
    }

    fn read_body_lf(src: &mut BytesMut) -> Result<Option<ChunkedState>, ParseError> {
        match next_byte!(src) {
            b'\n' => Ok(Some(Size)),
            _ => Err(ParseError::invalid_body("expected LF after chunk data")),
        }
    }

    /// The zero-size chunk must be followed by one empty line; a trailer
    /// section here is not supported.
    fn read_end_cr(src: &mut BytesMut) -> Result<Option<ChunkedState>, ParseError> {
        match next_byte!(src) {
            b'\r' => Ok(Some(EndLf)),
            _ => Err(ParseError::invalid_body("trailer sections are not supported")),
        }
    }

    fn read_end_lf(src: &mut BytesMut) -> Result<Option<ChunkedState>, ParseError> {
        match next_byte!(src) {
            b'\n' => Ok(Some(End)),
            _ => Err(ParseError::invalid_body("expected LF closing the chunked body")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut) -> Result<Vec<u8>, ParseError> {
        let mut payload = Vec::new();
        loop {
            match decoder.decode(buffer)? {
                Some(PayloadItem::Chunk(bytes)) => payload.extend_from_slice(&bytes),
                Some(PayloadItem::Eof) => return Ok(payload),
                None => panic!("decoder starved on a complete body"),
            }
        }
    }

    #[test]
    fn single_chunk() {
        let mut buffer = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let payload = collect(&mut decoder, &mut buffer).unwrap();
        assert_eq!(payload, b"1234567890abcdef");
        assert!(buffer.is_empty());
    }

    #[test]
    fn five_byte_chunk_then_terminal() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let payload = collect(&mut decoder, &mut buffer).unwrap();
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn terminal_chunk_only_decodes_to_zero_bytes() {
        let mut buffer = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let payload = collect(&mut decoder, &mut buffer).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn payload_is_independent_of_chunk_boundaries() {
        let framings: [&[u8]; 2] = [
            b"13\r\nthe quick brown fox\r\n0\r\n\r\n",
            b"3\r\nthe\r\nA\r\n quick bro\r\n6\r\nwn fox\r\n0\r\n\r\n",
        ];

        let mut payloads = Vec::new();
        for framing in framings {
            let mut buffer = BytesMut::from(framing);
            let mut decoder = ChunkedDecoder::new();
            payloads.push(collect(&mut decoder, &mut buffer).unwrap());
        }

        assert_eq!(payloads[0], b"the quick brown fox");
        assert_eq!(payloads[0], payloads[1]);
    }

    #[test]
    fn uppercase_hex_and_trailing_whitespace_accepted() {
        let mut buffer = BytesMut::from(&b"A \r\n0123456789\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let payload = collect(&mut decoder, &mut buffer).unwrap();
        assert_eq!(payload, b"0123456789");
    }

    #[test]
    fn non_hex_size_line_is_malformed() {
        let mut buffer = BytesMut::from(&b"zz\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::MalformedSizeLine { .. })));
    }

    #[test]
    fn chunk_extension_is_rejected_not_skipped() {
        let mut buffer = BytesMut::from(&b"5;name=value\r\nhello\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::MalformedSizeLine { .. })));
    }

    #[test]
    fn oversized_hex_size_is_malformed() {
        let mut buffer = BytesMut::from(&b"fffffffffffffffff\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::MalformedSizeLine { .. })));
    }

    #[test]
    fn missing_terminator_after_chunk_data() {
        let mut buffer = BytesMut::from(&b"5\r\nhelloXX"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn trailer_section_is_rejected() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n0\r\nTrailer: value\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        let result = decoder.decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn chunk_split_across_reads() {
        let mut buffer = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hel"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r\n0\r\n\r\n");

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"lo"));
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn large_chunk() {
        let size = 1024 * 1024;
        let mut data = Vec::with_capacity(size + 16);
        data.extend(format!("{size:x}\r\n").into_bytes());
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new();

        let payload = collect(&mut decoder, &mut buffer).unwrap();
        assert_eq!(payload.len(), size);
        assert!(payload.iter().all(|&b| b == b'A'));
    }
}
