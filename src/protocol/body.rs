//! Streaming request body.
//!
//! [`ReqBody`] implements `http_body::Body` directly over a mutable borrow of
//! the connection's framed read stream. The handler pulls frames while the
//! decoder keeps track of the body framing; once the handler returns, the
//! connection drains whatever the handler left unread (see
//! `HttpConnection`), so no channel machinery is needed between the two.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestStreamItem};

/// Dynamically typed view of the connection's framed read stream.
pub type BodyStream<'conn> = &'conn mut (dyn Stream<Item = RequestStreamItem> + Send + Unpin);

/// The body of an in-flight request, borrowed from its connection.
///
/// Every frame is payload data from a declared chunk (or from the declared
/// `Content-Length` span); framing bytes never show up here. If the
/// underlying stream ends before the decoder has seen the end of the body,
/// polling yields [`ParseError::TruncatedStream`].
pub struct ReqBody<'conn> {
    stream: BodyStream<'conn>,
    payload_size: PayloadSize,
    eof: bool,
}

impl<'conn> ReqBody<'conn> {
    pub(crate) fn new(stream: BodyStream<'conn>, payload_size: PayloadSize) -> Self {
        let eof = payload_size.is_empty();
        Self { stream, payload_size, eof }
    }
}

impl Body for ReqBody<'_> {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if this.eof {
            return Poll::Ready(None);
        }

        match this.stream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(Message::Payload(PayloadItem::Chunk(bytes))))) => {
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Ok(Message::Payload(PayloadItem::Eof)))) => {
                this.eof = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Ok(Message::Header(_)))) => {
                Poll::Ready(Some(Err(ParseError::invalid_body("received header while reading request body"))))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            // the connection closed under us before the body was complete
            Poll::Ready(None) => Poll::Ready(Some(Err(ParseError::TruncatedStream))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.eof
    }

    fn size_hint(&self) -> SizeHint {
        self.payload_size.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestMessage;
    use http_body_util::BodyExt;

    fn payload(items: Vec<PayloadItem>) -> Vec<RequestStreamItem> {
        items.into_iter().map(|item| Ok(RequestMessage::Payload(item))).collect()
    }

    #[tokio::test]
    async fn collects_chunks_in_arrival_order() {
        let items = payload(vec![
            PayloadItem::Chunk(Bytes::from_static(b"hello")),
            PayloadItem::Chunk(Bytes::from_static(b" world")),
            PayloadItem::Eof,
        ]);
        let mut stream = futures::stream::iter(items);

        let body = ReqBody::new(&mut stream, PayloadSize::Chunked);
        let collected = body.collect().await.unwrap().to_bytes();

        assert_eq!(&collected[..], b"hello world");
    }

    #[tokio::test]
    async fn empty_payload_yields_no_frames() {
        let mut stream = futures::stream::iter(Vec::<RequestStreamItem>::new());

        let body = ReqBody::new(&mut stream, PayloadSize::Empty);
        assert!(body.is_end_stream());

        let collected = body.collect().await.unwrap().to_bytes();
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn stream_ending_early_is_truncation() {
        let items = payload(vec![PayloadItem::Chunk(Bytes::from_static(b"hell"))]);
        let mut stream = futures::stream::iter(items);

        let body = ReqBody::new(&mut stream, PayloadSize::Length(10));
        let result = body.collect().await;

        assert!(matches!(result, Err(ParseError::TruncatedStream)));
    }
}
