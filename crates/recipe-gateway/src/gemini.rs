//! Client for the Gemini generateContent API

use async_trait::async_trait;
use recipe_core::ValidatedImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::GatewayError;
use crate::model::{GenerationParams, GenerativeModel};
use crate::sse::{decode_sse_stream, TextStream};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Request body for generateContent and streamGenerateContent
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationParams,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl GenerateContentRequest {
    /// One user turn: the prompt first, then each image inline
    pub fn new(prompt: &str, images: &[ValidatedImage], params: &GenerationParams) -> Self {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(Part::Text {
            text: prompt.to_string(),
        });
        parts.extend(images.iter().map(|image| Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type().to_string(),
                data: image.to_base64(),
            },
        }));

        Self {
            contents: vec![Content { parts }],
            generation_config: *params,
        }
    }
}

/// Response body, also the payload of each streamed event
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<UpstreamErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        (!text.is_empty()).then_some(text)
    }
}

/// Gemini-backed [`GenerativeModel`]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new client
    ///
    /// `timeout` bounds single-response calls end to end; streamed calls
    /// only get it as a connect timeout.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        Self::new(
            &config.gemini_base_url,
            &config.gemini_model,
            &config.gemini_api_key,
            config.upstream_timeout(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!("Upstream API error: {} - {}", status, body);

        Err(GatewayError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        images: &[ValidatedImage],
        params: &GenerationParams,
    ) -> Result<String, GatewayError> {
        let url = self.endpoint("generateContent");
        let request = GenerateContentRequest::new(prompt, images, params);

        debug!("Calling upstream model: {} ({} images)", url, images.len());

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::UpstreamMalformed(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(GatewayError::Upstream {
                status: err.code,
                body: err.message,
            });
        }

        parsed.text().ok_or(GatewayError::UpstreamEmptyResponse)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<TextStream, GatewayError> {
        let url = self.endpoint("streamGenerateContent");
        let request = GenerateContentRequest::new(prompt, &[], params);

        debug!("Opening upstream stream: {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        Ok(decode_sse_stream(response.bytes_stream()))
    }
}
