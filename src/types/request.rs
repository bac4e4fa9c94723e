//! Inbound chat requests and the upstream generation request derived from them.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// True when the message has no content once surrounding whitespace is removed.
    pub fn is_blank(&self) -> bool {
        self.message.trim().is_empty()
    }

    /// Prompt forwarded upstream. The message is sent as-is, untrimmed.
    pub fn prompt(&self) -> &str {
        &self.message
    }
}

/// Sampling parameters passed through to the inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub num_predict: u32,
    pub temperature: f32,
    pub num_thread: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            num_predict: 1000,
            temperature: 0.7,
            num_thread: 2,
        }
    }
}

/// Request body for the upstream `/api/generate` endpoint.
///
/// The gateway only ever asks for a streamed response; `stream` is fixed to
/// `true` and not settable.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerationOptions,
}

impl GenerateRequest {
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: true,
            options,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn stream(&self) -> bool {
        self.stream
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }
}
