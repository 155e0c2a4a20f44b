use serde::{Deserialize, Serialize};

/// Artwork pinned to content-addressed storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub ipfs_hash: String,
    pub ipfs_url: String,
    pub gateway_url: String,
    /// Inline PNG preview, base64 encoded.
    #[serde(default)]
    pub base64: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub generated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body returned by the image endpoint, success or not.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub image: Option<GeneratedImage>,
    #[serde(default)]
    pub metadata: Option<ImageMetadata>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ImageGenerationResponse {
    /// `error` plus `details` when the server sent both.
    pub fn failure_reason(&self) -> Option<String> {
        match (self.error.as_deref(), self.details.as_deref()) {
            (Some(error), Some(details)) if !details.trim().is_empty() => {
                Some(format!("{error}: {details}"))
            }
            (Some(error), _) => Some(error.to_string()),
            (None, Some(details)) => Some(details.to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub success: bool,
    pub ipfs_hash: String,
    pub url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: u64,
}

/// `ipfs://` link for a content address.
pub fn ipfs_url(content_address: &str) -> String {
    format!("ipfs://{content_address}")
}

/// Gateway link for a content address. Trailing slashes on the gateway are ignored.
pub fn gateway_url(gateway: &str, content_address: &str) -> String {
    format!("{}/ipfs/{content_address}", gateway.trim_end_matches('/'))
}
