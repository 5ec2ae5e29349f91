use std::io;
use thiserror::Error;

/// Top-level error for a connection's request/response cycle.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Errors raised while decoding a request, including its body.
///
/// Body framing failures are fatal for the current request: once the chunk
/// grammar is violated the stream position is lost and the connection cannot
/// be resynchronized.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header section too large, current: {current_size} exceeds the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header count exceeds the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    /// The line preceding a chunk was not a valid hexadecimal size line.
    #[error("malformed chunk size line: {reason}")]
    MalformedSizeLine { reason: String },

    /// The connection closed while body bytes or a terminator line were still
    /// outstanding.
    #[error("stream closed before the request body was complete")]
    TruncatedStream,

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn malformed_size_line<S: ToString>(reason: S) -> Self {
        Self::MalformedSizeLine { reason: reason.to_string() }
    }

    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    /// Returns true if the error came from decoding the body rather than the
    /// header section. Used to pick a response status for a failed upload.
    pub fn is_body_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedSizeLine { .. } | Self::TruncatedStream | Self::InvalidBody { .. }
        )
    }
}

/// Errors raised while encoding and sending a response.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
