//! Blocking HTTP transport
//!
//! Every remote call in the pipeline goes through [`HttpTransport`] so the
//! storage, provider and fetcher code can be driven by a scripted transport
//! in tests. The production implementation wraps a `ureq` agent with
//! redirects and status-as-error both disabled: callers see every status
//! code and every `Location` header themselves.

use brandgen_core::{BrandgenError, Result};
use std::fmt;
use std::io::Read;
use std::time::Duration;

/// HTTP method subset used by the remote services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// An outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn bytes(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self = self.header("Content-Type", content_type);
        self.body = Some(body);
        self
    }

    pub fn json(self, value: &serde_json::Value) -> Self {
        // Serializing a `Value` cannot fail
        let body = serde_json::to_vec(value).unwrap_or_default();
        self.bytes("application/json", body)
    }

    /// Look up a header by case-insensitive name
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response whose body has not been read yet
pub struct HttpResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: Box<dyn Read>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Drain the body into a string (lossy for non-UTF-8 bytes)
    pub fn text(mut self) -> Result<String> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf).map_err(|e| {
            BrandgenError::TransportError(format!("Failed to read response body: {}", e))
        })?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Something that can execute a single HTTP exchange
pub trait HttpTransport {
    /// Send the request and return the response, whatever its status.
    /// Only failures that produce no response at all are errors.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }
}

/// `ureq`-backed transport used by the CLI
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl HttpTransport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        tracing::debug!(method = %request.method, url = %request.url, "http request");

        let body = request.body.as_deref().unwrap_or(&[]);
        let result = match request.method {
            Method::Get => with_headers(self.agent.get(&request.url), &request.headers).call(),
            Method::Post => {
                with_headers(self.agent.post(&request.url), &request.headers).send(body)
            }
            Method::Delete if request.body.is_some() => with_headers(
                self.agent.delete(&request.url).force_send_body(),
                &request.headers,
            )
            .send(body),
            Method::Delete => {
                with_headers(self.agent.delete(&request.url), &request.headers).call()
            }
        };

        let response = result.map_err(|e| {
            BrandgenError::TransportError(format!("{} {} failed: {}", request.method, request.url, e))
        })?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        tracing::debug!(status, url = %request.url, "http response");

        Ok(HttpResponse {
            status,
            location,
            body: Box::new(response.into_body().into_reader()),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = HttpRequest::post("https://api.example.com/x")
            .bearer("secret")
            .json(&serde_json::json!({"a": 1}));

        assert_eq!(req.method, Method::Post);
        assert_eq!(req.header_value("authorization"), Some("Bearer secret"));
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
    }

    #[test]
    fn test_status_helpers() {
        let mock = MockTransport::new();
        mock.push_redirect(302, "https://cdn.example.com/a.png")
            .push_bytes(204, vec![]);

        let first = mock.execute(HttpRequest::get("https://a")).unwrap();
        assert!(first.is_redirect());
        assert!(!first.is_success());
        let second = mock.execute(HttpRequest::get("https://b")).unwrap();
        assert!(second.is_success());
        assert_eq!(mock.request_count(), 2);
    }

    #[test]
    fn test_text_body() {
        let mock = MockTransport::new();
        mock.push_bytes(200, b"hello".to_vec());
        let resp = mock.execute(HttpRequest::get("https://a")).unwrap();
        assert_eq!(resp.text().unwrap(), "hello");
    }

    #[test]
    fn test_exhausted_script_is_transport_error() {
        let mock = MockTransport::new();
        let err = mock.execute(HttpRequest::get("https://a")).unwrap_err();
        assert!(matches!(err, BrandgenError::TransportError(_)));
    }
}
