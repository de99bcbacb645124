//! Plain-data HTTP request/response types.
//!
//! # Design
//! The transport builds `HttpRequest` values and classifies `HttpResponse`
//! values as plain data; only the `execute` step touches the network. This
//! keeps URL construction, header assembly, and status classification unit
//! testable without a server.
//!
//! All fields use owned types (`String`, `Vec`) so values are trivially
//! clonable into test fixtures.

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// An HTTP request described as plain data.
///
/// `url` is the full request URL including any query string. `body`, when
/// present, is a form-encoded string (`application/x-www-form-urlencoded`).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}
