//! Google Gemini answer evaluator.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use dailyprep_core::error::ProviderError;
use dailyprep_core::traits::{AnswerEvaluator, EvaluationReply, EvaluationRequest};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// `generateContent` client sending answer photos as inline data.
pub struct GeminiEvaluator {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiEvaluator {
    pub fn new(api_key: &str, model: Option<String>, base_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    temperature: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn build_request(request: &EvaluationRequest) -> GeminiRequest {
    let mut parts = vec![GeminiPart::Text {
        text: request.prompt.clone(),
    }];
    parts.extend(request.images.iter().map(|img| GeminiPart::Inline {
        inline_data: GeminiBlob {
            mime_type: img.mime_type.clone(),
            data: STANDARD.encode(&img.bytes),
        },
    }));

    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".into(),
            parts,
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".into(),
            temperature: 0.2,
        },
    }
}

#[async_trait]
impl AnswerEvaluator for GeminiEvaluator {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, request), fields(model = %self.model, images = request.images.len()))]
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationReply> {
        let start = Instant::now();
        let body = build_request(request);

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
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
        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_ms: 30_000,
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

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("generateContent: {e}")))?;

        if let Some(reason) = api_response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(ProviderError::ApiError {
                status,
                message: format!("prompt blocked: {reason}"),
            }
            .into());
        }

        let text: String = api_response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse("no candidate text".into()).into());
        }

        Ok(EvaluationReply {
            text,
            model: api_response
                .model_version
                .unwrap_or_else(|| self.model.clone()),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
