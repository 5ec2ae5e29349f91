//! Response status-line and header serialization.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{header, HeaderValue, Version};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Serializes a [`ResponseHead`], inserting the `Content-Length` header the
/// body framing calls for. Only HTTP/1.1 responses are produced; chunked
/// response bodies are not supported by this server.
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match head.version() {
            Version::HTTP_11 => {
                write!(
                    BufWriter(dst),
                    "HTTP/1.1 {} {}\r\n",
                    head.status().as_str(),
                    head.status().canonical_reason().unwrap_or("")
                )?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        match payload_size {
            PayloadSize::Length(n) => {
                head.headers_mut().insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Empty => {
                const ZERO: HeaderValue = HeaderValue::from_static("0");
                head.headers_mut().insert(header::CONTENT_LENGTH, ZERO);
            }
            PayloadSize::Chunked => {
                error!("chunked response bodies are not supported");
                return Err(SendError::invalid_body("chunked response bodies are not supported"));
            }
        }

        for (header_name, header_value) in head.headers().iter() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// `io::Write` adapter over `BytesMut`, space already reserved.
struct BufWriter<'a>(&'a mut BytesMut);

impl Write for BufWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
