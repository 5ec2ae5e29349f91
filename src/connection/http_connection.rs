use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;

use futures::{SinkExt, StreamExt};
use http::header::EXPECT;
use http::{Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};

use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info};

/// One accepted connection: requests in, responses out.
///
/// The connection decodes each request, hands the header plus the streaming
/// body to the [`Handler`], drains whatever body bytes the handler left
/// unread (so keep-alive stays usable), and encodes the response. Request
/// parse failures produce a `400` and close the connection; handler failures
/// produce a `500`.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    self.do_process(header, payload_size, &handler).await?;
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received body payload while expecting a request header");
                    let error_response = build_error_response(StatusCode::BAD_REQUEST);
                    self.do_send_response(error_response).await?;
                    return Err(ParseError::invalid_body("expected header but received body payload").into());
                }

                Some(Err(e)) => {
                    error!("failed decoding next request, cause {}", e);
                    let error_response = build_error_response(StatusCode::BAD_REQUEST);
                    self.do_send_response(error_response).await?;
                    return Err(e.into());
                }

                None => {
                    info!("no more requests, closing connection");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, handler: &Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        // clients sending sizable uploads tend to wait for the interim
        // response before transmitting the body
        if let Some(value) = header.headers().get(EXPECT) {
            let slice = value.as_bytes();
            if slice.len() >= 4 && &slice[0..4] == b"100-" {
                let writer = self.framed_write.get_mut();
                writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
                writer.flush().await.map_err(SendError::io)?;
                info!("sent continue response for expect request header");
            }
        }

        let response_result = {
            let req_body = ReqBody::new(&mut self.framed_read, payload_size);
            let request = header.body(req_body);
            handler.call(request).await
        };

        // protocol correctness: the body must be consumed even if the
        // handler abandoned it, otherwise the next request's header would be
        // read out of body bytes
        if let Err(e) = self.drain_request_body().await {
            error!("failed draining request body, cause {}", e);
            let error_response = build_error_response(StatusCode::BAD_REQUEST);
            self.do_send_response(error_response).await?;
            return Err(e);
        }

        self.send_response(response_result).await
    }

    async fn drain_request_body(&mut self) -> Result<(), HttpError> {
        if !self.framed_read.decoder().is_reading_payload() {
            return Ok(());
        }

        let mut skipped: usize = 0;
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                    skipped += bytes.len();
                }

                Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                    if skipped > 0 {
                        info!(size = skipped, "skipped unread request body");
                    }
                    return Ok(());
                }

                Some(Ok(Message::Header(_))) => {
                    return Err(ParseError::invalid_body("received header while draining request body").into());
                }

                Some(Err(e)) => return Err(e.into()),

                None => return Err(ParseError::TruncatedStream.into()),
            }
        }
    }

    async fn send_response<T, E>(&mut self, response_result: Result<Response<T>, E>) -> Result<(), HttpError>
    where
        T: Body<Data = Bytes> + Unpin,
        T::Error: Display,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        match response_result {
            Ok(response) => self.do_send_response(response).await,
            Err(e) => {
                error!("handler failed, cause: {}", e.into());
                let error_response = build_error_response(StatusCode::INTERNAL_SERVER_ERROR);
                self.do_send_response(error_response).await
            }
        }
    }

    async fn do_send_response<T>(&mut self, response: Response<T>) -> Result<(), HttpError>
    where
        T: Body<Data = Bytes> + Unpin,
        T::Error: Display,
    {
        let (header_parts, mut body) = response.into_parts();

        let payload_size = {
            let size_hint = body.size_hint();
            match size_hint.exact() {
                Some(0) => PayloadSize::Empty,
                Some(length) => PayloadSize::Length(length),
                None => {
                    return Err(SendError::invalid_body("streaming response bodies are not supported").into());
                }
            }
        };

        let header = Message::<_, Bytes>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));
        if payload_size.is_empty() {
            // header-only response, flush the underlying IO right away
            self.framed_write.send(header).await?;
        } else {
            self.framed_write.feed(header).await?;
        }

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    let payload_item = frame
                        .into_data()
                        .map(PayloadItem::Chunk)
                        .map_err(|_| SendError::invalid_body("response frame is not data"))?;

                    self.framed_write.send(Message::Payload(payload_item)).await?;
                }

                Some(Err(e)) => {
                    return Err(SendError::invalid_body(format!("failed resolving response body: {e}")).into());
                }

                None => {
                    self.framed_write.send(Message::Payload(PayloadItem::<Bytes>::Eof)).await?;
                    return Ok(());
                }
            }
        }
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    Response::builder().status(status_code).body(Empty::<Bytes>::new()).unwrap()
}
