//! Result fetcher: stream a generated image to disk, following redirects

use crate::transport::{HttpRequest, HttpTransport};
use brandgen_core::{BrandgenError, Result};
use std::io::Write;
use std::path::Path;

const MAX_REDIRECTS: u32 = 10;

/// Downloads a remote result to a local path
pub trait ResultFetcher {
    /// Write the body behind `url` to `dest`, returning the byte count.
    /// On failure no partial file is left at `dest`.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// HTTP fetcher that resolves redirects itself
pub struct HttpFetcher<T: HttpTransport> {
    transport: T,
    max_redirects: u32,
}

impl<T: HttpTransport> HttpFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            max_redirects: MAX_REDIRECTS,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    fn stream_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut current = url.to_string();
        let mut hops = 0u32;

        let mut response = loop {
            let response = self
                .transport
                .execute(HttpRequest::get(current.clone()))
                .map_err(|e| BrandgenError::DownloadError(e.to_string()))?;

            if !response.is_redirect() {
                break response;
            }
            if hops >= self.max_redirects {
                return Err(BrandgenError::DownloadError(format!(
                    "Too many redirects (> {}) starting at {}",
                    self.max_redirects, url
                )));
            }
            let location = response.location.as_deref().ok_or_else(|| {
                BrandgenError::DownloadError(format!(
                    "HTTP {} from {} without Location",
                    response.status, current
                ))
            })?;
            let next = resolve_location(&current, location);
            tracing::debug!(from = %current, to = %next, status = response.status, "following redirect");
            current = next;
            hops += 1;
        };

        if !response.is_success() {
            return Err(BrandgenError::DownloadError(format!(
                "HTTP {} from {}",
                response.status, current
            )));
        }

        let file = std::fs::File::create(dest)?;
        let mut writer = std::io::BufWriter::new(file);
        let written = std::io::copy(&mut response.body, &mut writer)
            .map_err(|e| BrandgenError::DownloadError(format!("Body read failed: {}", e)))?;
        writer.flush()?;
        Ok(written)
    }
}

impl<T: HttpTransport> ResultFetcher for HttpFetcher<T> {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let result = self.stream_to(url, dest);
        if result.is_err() && dest.exists() {
            std::fs::remove_file(dest).ok();
        }
        result
    }
}

/// Resolve a `Location` header against the URL that produced it.
/// Handles absolute, scheme-relative and host-relative forms.
pub fn resolve_location(current: &str, location: &str) -> String {
    if location.contains("://") {
        return location.to_string();
    }

    let (scheme, rest) = current.split_once("://").unwrap_or(("https", current));
    if let Some(stripped) = location.strip_prefix("//") {
        return format!("{}://{}", scheme, stripped);
    }

    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    if location.starts_with('/') {
        return format!("{}://{}{}", scheme, authority, location);
    }

    // Relative to the current path's directory
    let path = &rest[authority.len()..];
    let path = path.split(['?', '#']).next().unwrap_or("");
    let dir = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };
    format!("{}://{}{}{}", scheme, authority, dir, location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("brandgen_fetch_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_follows_redirect_chain() {
        let dir = temp_dir();
        let dest = dir.join("fleet-1.png");
        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        let transport = MockTransport::new();
        transport
            .push_redirect(302, "https://cdn-a.example.com/tmp/1.png")
            .push_redirect(302, "/signed/1.png?sig=abc")
            .push_bytes(200, payload.clone());
        let fetcher = HttpFetcher::new(&transport);

        let written = fetcher.fetch("https://oss.example.com/result.png", &dest).unwrap();
        assert_eq!(written, payload.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), payload);

        let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://oss.example.com/result.png",
                "https://cdn-a.example.com/tmp/1.png",
                "https://cdn-a.example.com/signed/1.png?sig=abc",
            ]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_network_error_leaves_no_file() {
        let dir = temp_dir();
        let dest = dir.join("out.png");
        let transport = MockTransport::new();
        transport.push_failure("connection reset by peer");

        let err = HttpFetcher::new(&transport).fetch("https://x/a.png", &dest).unwrap_err();
        assert!(matches!(err, BrandgenError::DownloadError(_)));
        assert!(!dest.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_error_status_is_not_written() {
        let dir = temp_dir();
        let dest = dir.join("out.png");
        let transport = MockTransport::new();
        transport.push_bytes(403, b"<Error>AccessDenied</Error>".to_vec());

        let err = HttpFetcher::new(&transport).fetch("https://x/a.png", &dest).unwrap_err();
        assert!(err.to_string().contains("HTTP 403"));
        assert!(!dest.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_redirect_limit() {
        let dir = temp_dir();
        let dest = dir.join("out.png");
        let transport = MockTransport::new();
        transport
            .push_redirect(301, "https://x/b")
            .push_redirect(301, "https://x/c")
            .push_redirect(301, "https://x/d");

        let fetcher = HttpFetcher::new(&transport).with_max_redirects(2);
        let err = fetcher.fetch("https://x/a", &dest).unwrap_err();
        assert!(err.to_string().contains("Too many redirects"));
        assert_eq!(transport.request_count(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_redirect_without_location() {
        let dir = temp_dir();
        let transport = MockTransport::new();
        transport.push_bytes(302, Vec::new());
        let err = HttpFetcher::new(&transport)
            .fetch("https://x/a", &dir.join("o.png"))
            .unwrap_err();
        assert!(err.to_string().contains("without Location"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_resolve_location_forms() {
        let base = "https://oss.example.com/a/b/result.png?x=1";
        assert_eq!(resolve_location(base, "http://other/z.png"), "http://other/z.png");
        assert_eq!(resolve_location(base, "//cdn.example.com/z.png"), "https://cdn.example.com/z.png");
        assert_eq!(resolve_location(base, "/z.png"), "https://oss.example.com/z.png");
        assert_eq!(resolve_location(base, "z.png"), "https://oss.example.com/a/b/z.png");
        assert_eq!(resolve_location("https://host", "z.png"), "https://host/z.png");
    }
}
