//! Request handler seam.
//!
//! A [`Handler`] is the one capability registered with the server: it is
//! called once per decoded request with the streaming body and produces the
//! response. Implementations decide per method what to do; the connection
//! takes care of framing, draining unread body bytes and error responses.

use std::error::Error;

use async_trait::async_trait;
use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

#[async_trait]
pub trait Handler: Send + Sync {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: Request<ReqBody<'_>>) -> Result<Response<Self::RespBody>, Self::Error>;
}
