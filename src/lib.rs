//! An asynchronous audio upload server
//!
//! This crate provides a small HTTP/1.1 server built on top of tokio whose
//! single job is to receive a recorded audio payload over `POST` and persist
//! it to a file on disk. It accepts both `Content-Length` delimited bodies
//! and `Transfer-Encoding: chunked` bodies, which is what embedded recording
//! devices emit when they stream audio as they capture it and cannot know
//! the final size up front.
//!
//! # Features
//!
//! - HTTP/1.1 request parsing on asynchronous I/O
//! - Streaming request bodies, fixed-length or chunked
//! - Incremental persistence: each decoded chunk is written as it arrives
//! - Keep-alive connections
//! - Expect-continue mechanism
//! - Clean error handling: malformed chunk framing and truncated streams
//!   are reported as `400`, storage failures as `500`
//!
//! # Example
//!
//! ```no_run
//! use waverec::{Server, ServerConfig, UploadHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!
//!     let server = Server::builder()
//!         .address(config.socket_addr())?
//!         .handler(UploadHandler::new(config.output_path))
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`connection`]: Core connection handling and lifecycle management
//! - [`protocol`]: Protocol types and abstractions
//! - [`codec`]: Protocol encoding/decoding implementation
//! - [`handler`]: The request handler trait
//! - [`sink`]: Destinations for decoded body bytes
//! - [`upload`]: The recording upload handler
//!
//! # Limitations
//!
//! - HTTP/1.1 only
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64
//! - Chunk extensions and trailer sections are rejected rather than skipped

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod sink;
pub mod upload;

mod utils;

pub use config::ServerConfig;
pub use server::Server;
pub use upload::UploadHandler;
