//! Encoder for fixed-length response bodies.

use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

/// Writes response payload verbatim, up to the declared length.
///
/// A zero-length encoder also covers empty responses: it accepts only the
/// `Eof` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(bytes) => {
                if !bytes.has_remaining() {
                    return Ok(());
                }
                if self.remaining < bytes.remaining() as u64 {
                    warn!(declared = self.remaining, got = bytes.remaining(), "response body exceeds its declared length");
                    return Err(SendError::invalid_body("response body exceeds declared length"));
                }
                dst.extend_from_slice(bytes.chunk());
                self.remaining -= bytes.remaining() as u64;
                Ok(())
            }
            PayloadItem::Eof => Ok(()),
        }
    }
}
