use http::Response;

/// The header portion of an HTTP response, before the body is attached.
pub type ResponseHead = Response<()>;
