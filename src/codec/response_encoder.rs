//! Response encoder: head first, then the fixed-length (possibly empty)
//! body.

use crate::codec::body::LengthEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<LengthEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expected payload item but received a response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let length = match payload_size {
                    PayloadSize::Length(n) => n,
                    PayloadSize::Empty => 0,
                    PayloadSize::Chunked => {
                        return Err(SendError::invalid_body("chunked response bodies are not supported"));
                    }
                };

                self.header_encoder.encode((head, payload_size), dst)?;
                self.payload_encoder = Some(LengthEncoder::new(length));
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expected response head but received a payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);

                if is_eof {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadItem;
    use bytes::Bytes;
    use http::{Response, StatusCode};

    #[test]
    fn encodes_empty_response() {
        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Empty)), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n");
    }

    #[test]
    fn encodes_fixed_length_body() {
        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Length(5))), &mut dst).unwrap();
        encoder
            .encode(
                Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))),
                &mut dst,
            )
            .unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello");
    }

    #[test]
    fn payload_before_head_is_rejected() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let result =
            encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst);
        assert!(result.is_err());
    }
}
