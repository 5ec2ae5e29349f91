//! Core HTTP protocol types.
//!
//! - [`Message`], [`PayloadItem`], [`PayloadSize`]: wire-level message items
//!   shared between the codec and the connection
//! - [`RequestHeader`] / [`ResponseHead`]: typed header wrappers
//! - [`body::ReqBody`]: the streaming request body handed to handlers
//! - [`HttpError`], [`ParseError`], [`SendError`]: error taxonomy

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;
pub use message::RequestMessage;
pub use message::RequestStreamItem;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
