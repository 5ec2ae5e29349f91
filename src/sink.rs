//! Output sinks for received payloads.
//!
//! A [`BodySink`] receives the decoded body bytes of one upload, in arrival
//! order, and owns its output resource for the duration of that one upload.
//! [`FileSink`] writes to disk; [`BufferSink`] keeps the payload in memory
//! and exists mostly for tests.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::BytesMut;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Storage I/O failures while persisting an upload.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to create output file {path}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to write payload chunk: {source}")]
    Write { source: io::Error },

    #[error("failed to flush output: {source}")]
    Flush { source: io::Error },
}

/// Destination for one decoded upload body.
///
/// `finish` must be called on every exit path, success or failure, so the
/// underlying resource is flushed and released.
#[async_trait]
pub trait BodySink: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError>;

    async fn finish(&mut self) -> Result<(), SinkError>;
}

/// File-backed sink. Opening truncates, so each upload fully overwrites the
/// previous content of the path.
///
/// Concurrent uploads targeting the same path race at the filesystem level;
/// the final content is whatever the last writer leaves behind.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub async fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)
            .await
            .map_err(|source| SinkError::Create { path: path.to_path_buf(), source })?;
        debug!(path = %path.display(), "opened output file");
        Ok(Self { file })
    }
}

#[async_trait]
impl BodySink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        self.file.write_all(chunk).await.map_err(|source| SinkError::Write { source })
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.file.flush().await.map_err(|source| SinkError::Flush { source })
    }
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: BytesMut,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

#[async_trait]
impl BodySink for BufferSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
