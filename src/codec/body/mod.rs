//! Body codecs.
//!
//! Decoding covers the two body framings the server accepts:
//!
//! - [`ChunkedDecoder`]: chunked transfer encoding
//! - [`LengthDecoder`]: `Content-Length`-delimited bodies
//! - [`PayloadDecoder`]: dispatch between them (and bodiless requests)
//!
//! Response bodies are fixed-length or empty, encoded by [`LengthEncoder`].

mod chunked_decoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;

pub use chunked_decoder::ChunkedDecoder;
pub use length_decoder::LengthDecoder;
pub use length_encoder::LengthEncoder;
pub use payload_decoder::PayloadDecoder;
