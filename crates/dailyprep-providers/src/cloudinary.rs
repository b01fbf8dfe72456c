//! Cloudinary unsigned image upload.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::instrument;

use dailyprep_core::error::ProviderError;
use dailyprep_core::traits::{ImageData, ImageHost};

const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Uploads through an unsigned upload preset.
pub struct CloudinaryHost {
    cloud_name: String,
    upload_preset: String,
    folder: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl CloudinaryHost {
    pub fn new(
        cloud_name: &str,
        upload_preset: &str,
        folder: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
            folder,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    fn name(&self) -> &str {
        "cloudinary"
    }

    #[instrument(skip(self, image), fields(file = %image.file_name, bytes = image.bytes.len()))]
    async fn upload(&self, image: &ImageData) -> Result<String> {
        let file = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .context("invalid image MIME type")?;
        let mut form = Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part("file", file);
        if let Some(folder) = &self.folder {
            form = form.text("folder", folder.clone());
        }

        let response = self
            .client
            .post(format!(
                "{}/v1_1/{}/image/upload",
                self.base_url, self.cloud_name
            ))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthenticationFailed(body).into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status,
                message: body,
            }
            .into());
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("upload response: {e}")))?;
        Ok(parsed.secure_url)
    }
}
