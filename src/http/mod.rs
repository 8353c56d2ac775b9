//! HTTP plumbing shared by provider clients
//!
//! - `transport`: the injectable network seam (`HttpTransport`) and its
//!   `reqwest` implementation
//! - `headers`: header construction helpers

pub mod headers;
pub mod transport;

pub use headers::HttpHeaderBuilder;
pub use transport::{
    ByteStream, HttpRequestContext, HttpStreamResponse, HttpTransport, HttpTransportRequest,
    HttpTransportResponse, ReqwestTransport, read_body_text,
};
