//! The transport seam between the session and the network.
//!
//! A [`Transport`] sends one [`DavRequest`] and hands back whatever the
//! server answered as a [`DavResponse`], whatever the status. Only a
//! connection-level failure is an `Err`. Turning statuses into typed errors
//! is the caller's job ([`DavResponse::error_for_status`]).

use std::future::Future;
use std::pin::Pin;

use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap, HeaderName, HeaderValue, IF_MATCH, LOCATION};
use reqwest::{Method, StatusCode};

use crate::error::{CalDavError, CalDavResult};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Content type sent with PROPFIND bodies.
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
/// Content type sent with calendar object bodies.
pub const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Longest slice of a response body quoted in an error message.
const BODY_EXCERPT_LEN: usize = 200;

/// One HTTP exchange, as the session builds it.
#[derive(Debug, Clone)]
pub struct DavRequest {
    /// HTTP method (`PROPFIND`, `GET`, `PUT`, `DELETE`).
    pub method: Method,
    /// Absolute target URL.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body, if any.
    pub body: Option<String>,
}

impl DavRequest {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// A depth-1 `PROPFIND` carrying the given XML body.
    pub fn propfind(url: impl Into<String>, body: impl Into<String>) -> Self {
        let mut request = Self::new(propfind_method(), url);
        request
            .headers
            .insert(HeaderName::from_static("depth"), HeaderValue::from_static("1"));
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE));
        request.body = Some(body.into());
        request
    }

    /// A plain `GET`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// A `PUT` of a calendar object body.
    pub fn put(url: impl Into<String>, body: impl Into<String>) -> Self {
        let mut request = Self::new(Method::PUT, url);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(CALENDAR_CONTENT_TYPE));
        request.body = Some(body.into());
        request
    }

    /// A `DELETE`.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Adds an `If-Match` precondition for the given version token.
    ///
    /// # Errors
    ///
    /// Returns a malformed-object error if the token cannot be sent as a
    /// header value.
    pub fn if_match(mut self, token: &str) -> CalDavResult<Self> {
        let value = HeaderValue::from_str(&if_match_value(token)).map_err(|_| {
            CalDavError::malformed_object(format!("version token `{}` is not a valid header", token))
        })?;
        self.headers.insert(IF_MATCH, value);
        Ok(self)
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// What the server answered.
#[derive(Debug, Clone)]
pub struct DavResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body decoded as text.
    pub body: String,
}

impl DavResponse {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Builder: add a header. Invalid values are ignored.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The entity tag of the response, quotes stripped.
    pub fn version_token(&self) -> Option<String> {
        self.header(ETAG)
            .map(normalize_etag)
            .filter(|token| !token.is_empty())
    }

    /// The `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION)
    }

    /// Maps a non-2xx status to a typed error, passing 2xx responses through.
    ///
    /// `context` names the operation for the error message.
    ///
    /// # Errors
    ///
    /// 404/410 give `NotFound`, 412 gives `PreconditionFailed`, everything
    /// else gives `Transport`.
    pub fn error_for_status(self, context: &str) -> CalDavResult<Self> {
        let status = self.status;
        if status.is_success() {
            return Ok(self);
        }

        let code = status.as_u16();
        let err = match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                CalDavError::not_found(format!("{}: resource not found", context))
            }
            StatusCode::PRECONDITION_FAILED => CalDavError::precondition_failed(format!(
                "{}: version token does not match the current resource",
                context
            )),
            _ => CalDavError::transport(format!(
                "{}: unexpected status {}{}",
                context,
                status,
                body_excerpt(&self.body)
            )),
        };
        Err(err.with_status(code))
    }
}

/// Sends requests to a CalDAV server.
///
/// Implementations must be shareable across concurrent in-flight requests.
pub trait Transport: Send + Sync {
    /// Sends one request.
    ///
    /// Every HTTP status comes back as `Ok`; only connection-level failures
    /// (refused, timed out, TLS) are errors.
    fn send(&self, request: DavRequest) -> BoxFuture<'_, CalDavResult<DavResponse>>;
}

/// The WebDAV `PROPFIND` method.
pub fn propfind_method() -> Method {
    // Infallible for a token of plain ASCII letters.
    Method::from_bytes(b"PROPFIND").unwrap_or(Method::GET)
}

/// Strips quoting from an entity tag as sent by the server.
///
/// Weak tags (`W/"..."`) are kept whole so they can be echoed back verbatim.
pub fn normalize_etag(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("W/") {
        return raw.to_string();
    }
    raw.trim_matches('"').to_string()
}

/// Formats a stored version token for an `If-Match` header.
pub fn if_match_value(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("W/") || (token.len() >= 2 && token.starts_with('"') && token.ends_with('"'))
    {
        token.to_string()
    } else {
        format!("\"{}\"", token)
    }
}

fn body_excerpt(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }
    let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
    format!(": {}", excerpt)
}
