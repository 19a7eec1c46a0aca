//! Generative model abstraction

use async_trait::async_trait;
use recipe_core::ValidatedImage;
use serde::Serialize;

use crate::error::GatewayError;
use crate::sse::TextStream;

/// Sampling parameters sent with every upstream call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// Near-deterministic preset for reading ingredients off photos
    pub fn extraction() -> Self {
        Self {
            temperature: 0.1,
            top_k: 32,
            top_p: 0.95,
            max_output_tokens: 4096,
        }
    }

    /// Creative preset for writing recipes
    pub fn recipe() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

/// A text generation backend
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Single-response generation, optionally with inline images
    async fn generate(
        &self,
        prompt: &str,
        images: &[ValidatedImage],
        params: &GenerationParams,
    ) -> Result<String, GatewayError>;

    /// Incremental generation; errors before the first fragment are
    /// returned directly, later ones arrive through the stream
    async fn generate_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<TextStream, GatewayError>;
}
