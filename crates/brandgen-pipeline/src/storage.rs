//! Temporary object storage
//!
//! Source photos are pushed to a public bucket only so the vision model can
//! fetch them by URL. Every object created here is owned by exactly one job
//! and deleted when that job ends.

use crate::config::BrandgenConfig;
use crate::transport::{HttpRequest, HttpTransport};
use brandgen_core::{BrandgenError, Result};
use std::path::Path;

/// An uploaded temporary object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    /// Object name inside the bucket
    pub name: String,
    /// URL the generation service can fetch
    pub public_url: String,
}

/// Remote object store used for temporary uploads
pub trait ObjectStore {
    /// Make sure the public bucket exists
    fn ensure_bucket(&self) -> Result<()>;

    /// Upload a local file under `remote_name`
    fn upload(&self, local_path: &Path, remote_name: &str) -> Result<RemoteAsset>;

    /// Remove a previously uploaded object
    fn delete(&self, asset: &RemoteAsset) -> Result<()>;
}

/// Content type derived from the file extension
pub fn content_type_for(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "" => "application/octet-stream".to_string(),
        other => format!("image/{}", other),
    }
}

/// Per-job object name: `<prefix>-<unix millis>-<key><ext>`
pub fn remote_name(prefix: &str, key: &str, source: &Path, now_millis: i64) -> String {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    format!("{}-{}-{}{}", prefix, now_millis, key, ext)
}

/// Supabase storage REST API
pub struct SupabaseStore<T: HttpTransport> {
    transport: T,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl<T: HttpTransport> SupabaseStore<T> {
    /// Create a store from config; missing URL or key is a config error
    pub fn from_config(config: &BrandgenConfig, transport: T) -> Result<Self> {
        let creds = config.require_storage()?;
        Ok(Self {
            transport,
            base_url: creds.url.to_string(),
            service_key: creds.service_key.to_string(),
            bucket: creds.bucket.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, path)
    }

    /// Public URL of an object in this bucket
    pub fn public_url(&self, remote_name: &str) -> String {
        self.url(&format!("object/public/{}/{}", self.bucket, remote_name))
    }
}

fn status_error(what: &str, status: u16, body: &str) -> BrandgenError {
    let snippet: String = body.chars().take(200).collect();
    BrandgenError::UploadError(format!("{} failed (HTTP {}): {}", what, status, snippet))
}

fn as_upload_error(err: BrandgenError) -> BrandgenError {
    match err {
        BrandgenError::TransportError(msg) => BrandgenError::UploadError(msg),
        other => other,
    }
}

impl<T: HttpTransport> ObjectStore for SupabaseStore<T> {
    fn ensure_bucket(&self) -> Result<()> {
        let check = self
            .transport
            .execute(
                HttpRequest::get(self.url(&format!("bucket/{}", self.bucket)))
                    .bearer(&self.service_key),
            )
            .map_err(as_upload_error)?;
        if check.status == 200 {
            return Ok(());
        }

        let payload = serde_json::json!({
            "id": self.bucket,
            "name": self.bucket,
            "public": true,
        });
        let created = self
            .transport
            .execute(
                HttpRequest::post(self.url("bucket"))
                    .bearer(&self.service_key)
                    .json(&payload),
            )
            .map_err(as_upload_error)?;
        let status = created.status;
        if status == 200 || status == 201 {
            tracing::info!(bucket = %self.bucket, "created storage bucket");
            return Ok(());
        }

        let body = created.text()?;
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_default();
        if message.contains("already exists") {
            return Ok(());
        }
        Err(status_error("Bucket creation", status, &body))
    }

    fn upload(&self, local_path: &Path, remote_name: &str) -> Result<RemoteAsset> {
        let bytes = std::fs::read(local_path).map_err(|e| {
            BrandgenError::UploadError(format!("Cannot read {}: {}", local_path.display(), e))
        })?;

        let request = HttpRequest::post(self.url(&format!("object/{}/{}", self.bucket, remote_name)))
            .bearer(&self.service_key)
            .header("x-upsert", "true")
            .bytes(&content_type_for(local_path), bytes);
        let response = self.transport.execute(request).map_err(as_upload_error)?;

        if !(response.status == 200 || response.status == 201) {
            let status = response.status;
            let body = response.text().unwrap_or_default();
            return Err(status_error("Upload", status, &body));
        }

        Ok(RemoteAsset {
            name: remote_name.to_string(),
            public_url: self.public_url(remote_name),
        })
    }

    fn delete(&self, asset: &RemoteAsset) -> Result<()> {
        let payload = serde_json::json!({ "prefixes": [asset.name] });
        let response = self
            .transport
            .execute(
                HttpRequest::delete(self.url(&format!("object/{}", self.bucket)))
                    .bearer(&self.service_key)
                    .json(&payload),
            )
            .map_err(as_upload_error)?;

        if !response.is_success() {
            let status = response.status;
            let body = response.text().unwrap_or_default();
            return Err(status_error("Delete", status, &body));
        }
        Ok(())
    }
}
