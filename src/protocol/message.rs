use bytes::{Buf, Bytes};
use http_body::SizeHint;

use crate::protocol::{ParseError, RequestHeader};

/// A decoded or to-be-encoded HTTP message item: either a header or a piece
/// of payload.
///
/// `T` is the header type (request or response side), `Data` the payload
/// chunk type.
pub enum Message<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

/// The message item produced by the request decoder: request header plus the
/// body framing derived from it.
pub type RequestMessage = Message<(RequestHeader, PayloadSize)>;

/// One item of a message payload stream: a chunk of data, or the end of the
/// stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Eof,
}

/// How a message body is framed on the wire.
///
/// Derived from the `Content-Length` and `Transfer-Encoding` request headers,
/// and from the response body's size hint on the way out.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Body with a known length in bytes
    Length(u64),
    /// Body using chunked transfer encoding
    Chunked,
    /// No body
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl From<PayloadSize> for SizeHint {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Chunked => SizeHint::new(),
            PayloadSize::Empty => SizeHint::with_exact(0),
        }
    }
}

impl<T, Data: Buf> Message<T, Data> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }
}

impl<D: Buf> PayloadItem<D> {
    /// Returns true if this item marks the end of the payload stream.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns the contained bytes if this is a `Chunk`, `None` for `Eof`.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the item and returns the contained bytes if this is a `Chunk`.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

/// Item type of the connection's framed read stream, consumed by the request
/// body and by the connection's drain loop.
pub type RequestStreamItem = Result<RequestMessage, ParseError>;
