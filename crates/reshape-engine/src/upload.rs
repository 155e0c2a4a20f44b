use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client as HttpClient;
use reshape_contracts::images::UploadReceipt;
use serde_json::Value;

use crate::http::{build_client, read_body, truncate_text};

/// Pins a local file through the web app's `/api/upload` route.
pub struct UploadClient {
    url: String,
    http: HttpClient,
}

impl UploadClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            http: build_client()?,
        })
    }

    pub fn upload(&self, path: &Path) -> Result<UploadReceipt> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.png")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str(mime_for_path(path))
            .context("invalid upload mime type")?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .with_context(|| format!("upload request failed ({})", self.url))?;
        let (code, ok, body) = read_body("upload", response)?;
        decode_upload_body(code, ok, &body)
    }
}

fn decode_upload_body(code: u16, ok: bool, body: &str) -> Result<UploadReceipt> {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let server_error = parsed.get("error").and_then(Value::as_str);
    if !ok {
        let reason = server_error
            .map(str::to_string)
            .unwrap_or_else(|| truncate_text(body.trim(), 512));
        bail!("upload endpoint returned {code}: {reason}");
    }
    if let Some(error) = server_error {
        bail!("upload failed: {error}");
    }
    let receipt: UploadReceipt =
        serde_json::from_value(parsed).context("upload endpoint returned invalid JSON payload")?;
    if !receipt.success || receipt.ipfs_hash.trim().is_empty() {
        bail!("upload endpoint did not return a content address");
    }
    Ok(receipt)
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pinned_receipt() -> anyhow::Result<()> {
        let receipt = decode_upload_body(
            200,
            true,
            r#"{"success":true,"ipfsHash":"QmPinned","url":"https://gw.example/ipfs/QmPinned","filename":"art.png","size":2048}"#,
        )?;
        assert_eq!(receipt.ipfs_hash, "QmPinned");
        assert_eq!(receipt.size, 2048);
        Ok(())
    }

    #[test]
    fn surfaces_server_errors() {
        let message = |code, ok, body| {
            decode_upload_body(code, ok, body)
                .err()
                .map(|err| err.to_string())
                .unwrap_or_default()
        };
        assert_eq!(
            message(400, false, r#"{"error":"No file provided"}"#),
            "upload endpoint returned 400: No file provided"
        );
        assert_eq!(
            message(200, true, r#"{"error":"Failed to upload to IPFS"}"#),
            "upload failed: Failed to upload to IPFS"
        );
        assert_eq!(
            message(200, true, r#"{"success":false,"ipfsHash":"","url":""}"#),
            "upload endpoint did not return a content address"
        );
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for_path(Path::new("a/art.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("shape.svg")), "image/svg+xml");
        assert_eq!(mime_for_path(Path::new("blob")), "application/octet-stream");
    }
}
