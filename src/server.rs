use std::fmt::Display;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use bytes::Bytes;
use http_body::Body;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::connection::HttpConnection;
use crate::handler::Handler;

/// Accepts connections and hands each one to the configured [`Handler`].
pub struct Server<H> {
    address: Vec<SocketAddr>,
    handler: Arc<H>,
}

pub struct ServerBuilder<H> {
    address: Option<Vec<SocketAddr>>,
    handler: Option<H>,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("address must be set")]
    MissingAddress,

    #[error("handler must be set")]
    MissingHandler,
}

impl<H> ServerBuilder<H> {
    fn new() -> Self {
        Self { address: None, handler: None }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> io::Result<Self> {
        self.address = Some(address.to_socket_addrs()?.collect::<Vec<_>>());
        Ok(self)
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<Server<H>, ServerBuildError> {
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?;
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        Ok(Server { address, handler: Arc::new(handler) })
    }
}

impl<H> Server<H>
where
    H: Handler + 'static,
    H::RespBody: Body<Data = Bytes> + Unpin + Send,
    <H::RespBody as Body>::Error: Display + Send,
    H::Error: Send,
{
    pub fn builder() -> ServerBuilder<H> {
        ServerBuilder::new()
    }

    pub async fn run(self) -> io::Result<()> {
        info!("start listening at {:?}", self.address);
        let tcp_listener = TcpListener::bind(self.address.as_slice()).await?;

        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = self.handler.clone();

            tokio::spawn(async move {
                info!(peer = %remote_addr, "accepted connection");
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer);
                match connection.process(handler).await {
                    Ok(_) => {
                        info!("finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!("service has error, cause {}, connection shutdown", e);
                    }
                }
            });
        }
    }
}
