//! HTTP transport backed by reqwest.
//!
//! Credentials are attached preemptively as HTTP Basic on every request.

use base64::Engine;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::trace;

use crate::config::CalDavConfig;
use crate::error::{CalDavError, CalDavResult};
use crate::transport::{BoxFuture, DavRequest, DavResponse, Transport};

/// Default `Accept` header for every request.
const ACCEPT_VALUE: &str = "text/xml, application/xml, text/calendar";

/// A [`Transport`] that talks HTTP(S) through a pooled reqwest client.
pub struct HttpTransport {
    client: Client,
    authorization: HeaderValue,
}

impl HttpTransport {
    /// Builds the transport from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when credentials are missing and a
    /// transport error when the HTTP client cannot be built.
    pub fn new(config: &CalDavConfig) -> CalDavResult<Self> {
        config.validate()?;

        let (username, password) = match (&config.username, &config.password) {
            (Some(u), Some(p)) => (u.as_str(), p.as_str()),
            _ => {
                return Err(CalDavError::configuration(
                    "credentials required but not configured",
                ));
            }
        };

        let mut authorization = HeaderValue::from_str(&basic_auth(username, password))
            .map_err(|_| CalDavError::configuration("credentials contain invalid characters"))?;
        authorization.set_sensitive(true);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));

        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(default_headers)
            .build()
            .map_err(|e| {
                CalDavError::transport(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            client,
            authorization,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: DavRequest) -> BoxFuture<'_, CalDavResult<DavResponse>> {
        Box::pin(async move {
            let DavRequest {
                method,
                url,
                headers,
                body,
            } = request;

            trace!(method = %method, url = %url, "Sending request");

            let mut builder = self
                .client
                .request(method.clone(), &url)
                .headers(headers)
                .header(AUTHORIZATION, self.authorization.clone());
            if let Some(body) = body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await?;

            trace!(method = %method, url = %url, status = %status, "Received response");

            Ok(DavResponse {
                status,
                headers,
                body,
            })
        })
    }
}

/// Generates an HTTP Basic authentication header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalDavErrorCode;
    use std::time::Duration;

    #[test]
    fn basic_auth_encoding() {
        // base64("user:password") = "dXNlcjpwYXNzd29yZA=="
        assert_eq!(basic_auth("user", "password"), "Basic dXNlcjpwYXNzd29yZA==");
    }

    #[test]
    fn transport_creation() {
        let config = CalDavConfig::new("https://caldav.example.com/")
            .unwrap()
            .with_credentials("user", "pass")
            .with_timeout(Duration::from_secs(10));
        assert!(HttpTransport::new(&config).is_ok());
    }

    #[test]
    fn transport_requires_credentials() {
        let config = CalDavConfig::new("https://caldav.example.com/").unwrap();
        let err = HttpTransport::new(&config).err().unwrap();
        assert_eq!(err.code(), CalDavErrorCode::Configuration);
    }
}
