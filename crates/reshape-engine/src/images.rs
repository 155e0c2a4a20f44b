use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use reqwest::blocking::Client as HttpClient;
use reshape_contracts::images::{
    gateway_url, ipfs_url, GeneratedImage, ImageGenerationRequest, ImageGenerationResponse,
    ImageMetadata,
};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::context::{Notice, StudioContext};
use crate::http::{build_client, error_chain_text, read_body, truncate_text};

const DRYRUN_IMAGE_SIZE: u32 = 256;

pub trait ImageEndpoint: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &ImageGenerationRequest) -> Result<ImageGenerationResponse>;
}

/// The web app's `/api/generate-image` route.
pub struct HttpImageEndpoint {
    url: String,
    http: HttpClient,
}

impl HttpImageEndpoint {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            http: build_client()?,
        })
    }
}

impl ImageEndpoint for HttpImageEndpoint {
    fn name(&self) -> &str {
        "http"
    }

    fn generate(&self, request: &ImageGenerationRequest) -> Result<ImageGenerationResponse> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .with_context(|| format!("image generation request failed ({})", self.url))?;
        let (code, ok, body) = read_body("image generation", response)?;
        decode_image_body(code, ok, &body)
    }
}

fn decode_image_body(code: u16, ok: bool, body: &str) -> Result<ImageGenerationResponse> {
    let parsed = serde_json::from_str::<ImageGenerationResponse>(body);
    if !ok {
        let reason = parsed
            .ok()
            .and_then(|response| response.failure_reason())
            .unwrap_or_else(|| truncate_text(body.trim(), 512));
        bail!("image endpoint returned {code}: {reason}");
    }
    parsed.context("image endpoint returned invalid JSON payload")
}

/// Offline endpoint: a solid-colour PNG keyed by the prompt and a fake content address.
pub struct DryrunImageEndpoint {
    gateway: String,
}

impl DryrunImageEndpoint {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
        }
    }
}

impl ImageEndpoint for DryrunImageEndpoint {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &ImageGenerationRequest) -> Result<ImageGenerationResponse> {
        let digest = Sha256::digest(request.prompt.as_bytes());
        let mut image = RgbImage::new(DRYRUN_IMAGE_SIZE, DRYRUN_IMAGE_SIZE);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([digest[0], digest[1], digest[2]]);
        }
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .context("failed to encode dryrun image")?;

        let hash = format!("Qm{}", &hex::encode(digest)[..44]);
        Ok(ImageGenerationResponse {
            success: true,
            image: Some(GeneratedImage {
                ipfs_url: ipfs_url(&hash),
                gateway_url: gateway_url(&self.gateway, &hash),
                base64: BASE64.encode(png.into_inner()),
                ipfs_hash: hash,
            }),
            metadata: Some(ImageMetadata {
                name: request
                    .name
                    .clone()
                    .unwrap_or_else(|| "AI Generated Artwork".to_string()),
                description: request
                    .description
                    .clone()
                    .unwrap_or_else(|| request.prompt.clone()),
                generated_at: reshape_contracts::events::now_utc_iso(),
            }),
            error: None,
            details: None,
        })
    }
}

/// Shared "generation in flight" flag. Cheap to clone; a UI thread may poll it.
#[derive(Debug, Clone, Default)]
pub struct GeneratingFlag(Arc<AtomicBool>);

impl GeneratingFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn engage(&self) -> GeneratingGuard<'_> {
        self.0.store(true, Ordering::SeqCst);
        GeneratingGuard { flag: self }
    }
}

/// Clears the flag on every exit path, including early returns and panics.
struct GeneratingGuard<'a> {
    flag: &'a GeneratingFlag,
}

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.flag.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGenerationOutcome {
    pub success: bool,
    pub image: Option<GeneratedImage>,
    pub metadata: Option<ImageMetadata>,
    pub error: Option<String>,
}

impl ImageGenerationOutcome {
    fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            image: None,
            metadata: None,
            error: Some(reason.into()),
        }
    }
}

/// Generates artwork and remembers the latest successful result.
///
/// `generate` takes `&mut self`, so one client never has two requests in flight.
pub struct ImageGenerationClient {
    endpoint: Box<dyn ImageEndpoint>,
    ctx: StudioContext,
    generating: GeneratingFlag,
    generated: Option<GeneratedImage>,
}

impl ImageGenerationClient {
    pub fn new(endpoint: Box<dyn ImageEndpoint>, ctx: StudioContext) -> Self {
        Self {
            endpoint,
            ctx,
            generating: GeneratingFlag::default(),
            generated: None,
        }
    }

    pub fn with_generating_flag(mut self, flag: GeneratingFlag) -> Self {
        self.generating = flag;
        self
    }

    pub fn generating_flag(&self) -> GeneratingFlag {
        self.generating.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.generating.is_set()
    }

    pub fn current(&self) -> Option<&GeneratedImage> {
        self.generated.as_ref()
    }

    pub fn clear(&mut self) {
        if self.generated.take().is_some() {
            self.ctx.emit("image_cleared", json!({}));
        }
    }

    pub fn generate(
        &mut self,
        prompt: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ImageGenerationOutcome {
        if prompt.trim().is_empty() {
            self.ctx
                .notify(Notice::error("Please provide a description for the image"));
            return ImageGenerationOutcome::failure("Prompt is required");
        }

        let _guard = self.generating.engage();
        self.ctx.notify(
            Notice::info("Generating your AI artwork...")
                .with_description("This may take a few moments"),
        );
        self.ctx.emit(
            "image_generation_started",
            json!({
                "prompt": prompt,
                "endpoint": self.endpoint.name(),
            }),
        );

        let request = ImageGenerationRequest {
            prompt: prompt.to_string(),
            name: name.map(str::to_string),
            description: description.map(str::to_string),
        };
        let reason = match self.endpoint.generate(&request) {
            Ok(ImageGenerationResponse {
                success: true,
                image: Some(image),
                metadata,
                ..
            }) => {
                self.ctx.emit(
                    "image_generated",
                    json!({
                        "ipfs_hash": image.ipfs_hash,
                        "gateway_url": image.gateway_url,
                    }),
                );
                self.ctx.notify(
                    Notice::success("Image generated successfully!")
                        .with_description("Your artwork has been created and stored on IPFS"),
                );
                self.generated = Some(image.clone());
                return ImageGenerationOutcome {
                    success: true,
                    image: Some(image),
                    metadata,
                    error: None,
                };
            }
            Ok(response) => response
                .failure_reason()
                .unwrap_or_else(|| "Image generation failed".to_string()),
            Err(err) => error_chain_text(&err, 512),
        };

        tracing::warn!(reason = %reason, "image generation failed");
        self.ctx
            .emit("image_generation_failed", json!({ "error": reason }));
        self.ctx
            .notify(Notice::error("Image generation failed").with_description(reason.clone()));
        ImageGenerationOutcome::failure(reason)
    }
}
