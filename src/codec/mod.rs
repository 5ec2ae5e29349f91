//! HTTP wire codecs.
//!
//! Streaming encode/decode of HTTP/1.1 messages on top of
//! `tokio_util::codec`:
//!
//! - [`RequestDecoder`]: request head via [`header`], then the body via
//!   [`body`] (`Content-Length` span or chunked transfer encoding)
//! - [`ResponseEncoder`]: response head plus a fixed-length or empty body

pub mod body;
pub mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
