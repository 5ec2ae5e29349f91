//! Header codecs: [`HeaderDecoder`] for the request head, [`HeaderEncoder`]
//! for the response head.

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
