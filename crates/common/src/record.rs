//! Analytics records written once per generation request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which gateway operation produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Photo to ingredient list
    AnalyzeIngredients,
    /// Single-shot recipe text
    GenerateRecipe,
    /// Streamed recipe text
    StreamRecipe,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::AnalyzeIngredients => "analyze_ingredients",
            RequestType::GenerateRecipe => "generate_recipe",
            RequestType::StreamRecipe => "stream_recipe",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request/response pair as stored in the analytics table
///
/// Field names on the wire follow the table's snake_case columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationLogRecord {
    /// Originating client address (not an authenticated identity)
    #[serde(rename = "client_ip")]
    pub client_id: String,

    pub request_type: RequestType,

    pub ingredients_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,

    pub prompt_text: String,

    /// Full model output, or whatever was produced before a failure
    pub response_text: String,

    pub response_time_ms: u64,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl GenerationLogRecord {
    /// Start a record for a request; outcome fields are filled by
    /// [`succeeded`](Self::succeeded) or [`failed`](Self::failed)
    pub fn new(client_id: impl Into<String>, request_type: RequestType) -> Self {
        Self {
            client_id: client_id.into(),
            request_type,
            ingredients_count: 0,
            style_id: None,
            prompt_text: String::new(),
            response_text: String::new(),
            response_time_ms: 0,
            success: false,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_style(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    pub fn with_prompt(mut self, prompt_text: impl Into<String>) -> Self {
        self.prompt_text = prompt_text.into();
        self
    }

    pub fn with_ingredients_count(mut self, count: usize) -> Self {
        self.ingredients_count = count;
        self
    }

    /// Mark the request as successful
    pub fn succeeded(mut self, response_text: impl Into<String>, response_time_ms: u64) -> Self {
        self.response_text = response_text.into();
        self.response_time_ms = response_time_ms;
        self.success = true;
        self.error_message = None;
        self.timestamp = Utc::now();
        self
    }

    /// Mark the request as failed, keeping any partial output
    pub fn failed(
        mut self,
        error_message: impl Into<String>,
        partial_response: impl Into<String>,
        response_time_ms: u64,
    ) -> Self {
        self.response_text = partial_response.into();
        self.response_time_ms = response_time_ms;
        self.success = false;
        self.error_message = Some(error_message.into());
        self.timestamp = Utc::now();
        self
    }
}
