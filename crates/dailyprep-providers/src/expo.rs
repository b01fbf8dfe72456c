//! Expo push notification gateway.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use dailyprep_core::error::ProviderError;
use dailyprep_core::traits::{PushGateway, PushMessage, PushTicket};

const DEFAULT_BASE_URL: &str = "https://exp.host";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for `POST /--/api/v2/push/send`.
pub struct ExpoGateway {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl ExpoGateway {
    pub fn new(base_url: Option<String>, access_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            access_token,
            client,
        })
    }
}

#[derive(Deserialize)]
struct ExpoResponse {
    #[serde(default)]
    data: Vec<PushTicket>,
    #[serde(default)]
    errors: Vec<ExpoRequestError>,
}

#[derive(Deserialize)]
struct ExpoRequestError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl PushGateway for ExpoGateway {
    fn name(&self) -> &str {
        "expo"
    }

    #[instrument(skip(self, messages), fields(batch = messages.len()))]
    async fn send(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>> {
        let mut req = self
            .client
            .post(format!("{}/--/api/v2/push/send", self.base_url))
            .header("accept", "application/json")
            .header("content-type", "application/json");
        if let Some(token) = &self.access_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let response = req.json(messages).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
            } else {
                ProviderError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            }
            .into());
        }
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

        let parsed: ExpoResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("push response: {e}")))?;

        if let Some(err) = parsed.errors.first() {
            return Err(ProviderError::ApiError {
                status,
                message: format!("{}: {}", err.code, err.message),
            }
            .into());
        }
        Ok(parsed.data)
    }
}
