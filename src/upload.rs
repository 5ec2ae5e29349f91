//! The upload endpoint.
//!
//! [`UploadHandler`] accepts `POST` requests on any path (there is no
//! routing surface), streams the decoded body into a fresh [`FileSink`] and
//! answers with an empty body once the payload is on disk. The response is
//! deliberately sent only after the body has been fully persisted, so a
//! decode or storage failure is visible in the status code.

use std::convert::Infallible;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Empty};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::ParseError;
use crate::sink::{BodySink, FileSink, SinkError};

/// Receives audio payloads and records them to a fixed output path.
pub struct UploadHandler {
    output_path: PathBuf,
}

#[derive(Error, Debug)]
enum UploadError {
    #[error("body decode failed: {0}")]
    Body(#[from] ParseError),

    #[error("storage failed: {0}")]
    Sink(#[from] SinkError),
}

impl UploadHandler {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self { output_path: output_path.into() }
    }

    /// Streams every body frame into the sink. The sink is flushed on every
    /// exit path, including failures, so the output file is always released.
    async fn receive(&self, mut body: ReqBody<'_>) -> Result<u64, UploadError> {
        let mut sink = FileSink::create(&self.output_path).await?;

        let copied = Self::copy_body(&mut body, &mut sink).await;
        match copied {
            Ok(written) => {
                sink.finish().await?;
                Ok(written)
            }
            Err(e) => {
                let _ = sink.finish().await;
                Err(e)
            }
        }
    }

    async fn copy_body(body: &mut ReqBody<'_>, sink: &mut impl BodySink) -> Result<u64, UploadError> {
        let mut written: u64 = 0;
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(UploadError::Body)?;
            if let Ok(data) = frame.into_data() {
                sink.write_chunk(&data).await?;
                written += data.len() as u64;
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl Handler for UploadHandler {
    type RespBody = Empty<Bytes>;
    type Error = Infallible;

    async fn call(&self, request: Request<ReqBody<'_>>) -> Result<Response<Self::RespBody>, Self::Error> {
        if request.method() != Method::POST {
            warn!(method = %request.method(), "rejecting non-POST request");
            return Ok(empty_response(StatusCode::METHOD_NOT_ALLOWED));
        }

        let path = request.uri().path().to_string();
        let (_parts, body) = request.into_parts();

        let status = match self.receive(body).await {
            Ok(written) => {
                info!(bytes = written, uri = %path, output = %self.output_path.display(), "stored uploaded payload");
                StatusCode::OK
            }
            Err(UploadError::Body(e)) => {
                error!(cause = %e, uri = %path, "failed decoding upload body");
                StatusCode::BAD_REQUEST
            }
            Err(UploadError::Sink(e)) => {
                error!(cause = %e, uri = %path, "failed storing upload");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Ok(empty_response(status))
    }
}

fn empty_response(status: StatusCode) -> Response<Empty<Bytes>> {
    Response::builder().status(status).body(Empty::new()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::ReqBody;
    use crate::protocol::{Message, PayloadItem, PayloadSize, RequestStreamItem};

    fn chunks(parts: &[&'static [u8]]) -> Vec<RequestStreamItem> {
        let mut items: Vec<RequestStreamItem> = parts
            .iter()
            .map(|part| Ok(Message::Payload(PayloadItem::Chunk(Bytes::from_static(part)))))
            .collect();
        items.push(Ok(Message::Payload(PayloadItem::Eof)));
        items
    }

    fn request<'a>(
        method: Method,
        stream: &'a mut (impl futures::Stream<Item = RequestStreamItem> + Send + Unpin),
        payload_size: PayloadSize,
    ) -> Request<ReqBody<'a>> {
        Request::builder().method(method).uri("/upload").body(ReqBody::new(stream, payload_size)).unwrap()
    }

    #[tokio::test]
    async fn post_stores_body_at_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.wav");
        let handler = UploadHandler::new(&path);

        let mut stream = futures::stream::iter(chunks(&[b"hello", b" world"]));
        let response = handler.call(request(Method::POST, &mut stream, PayloadSize::Chunked)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn post_overwrites_previous_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.wav");
        std::fs::write(&path, b"previous recording, rather long").unwrap();
        let handler = UploadHandler::new(&path);

        let mut stream = futures::stream::iter(chunks(&[b"Hello, World!"]));
        let response = handler
            .call(request(Method::POST, &mut stream, PayloadSize::Length(13)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(std::fs::read(&path).unwrap(), b"Hello, World!");
    }

    #[tokio::test]
    async fn non_post_is_method_not_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.wav");
        let handler = UploadHandler::new(&path);

        let mut stream = futures::stream::iter(Vec::<RequestStreamItem>::new());
        let response = handler.call(request(Method::GET, &mut stream, PayloadSize::Empty)).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn body_decode_failure_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.wav");
        let handler = UploadHandler::new(&path);

        let items: Vec<RequestStreamItem> = vec![
            Ok(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"par")))),
            Err(ParseError::malformed_size_line("invalid byte 0x7a in chunk size")),
        ];
        let mut stream = futures::stream::iter(items);
        let response = handler.call(request(Method::POST, &mut stream, PayloadSize::Chunked)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn storage_failure_is_internal_error() {
        let handler = UploadHandler::new("/nonexistent-dir/recording.wav");

        let mut stream = futures::stream::iter(chunks(&[b"hello"]));
        let response = handler.call(request(Method::POST, &mut stream, PayloadSize::Chunked)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
