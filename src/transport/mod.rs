//! 上游传输层：向推理引擎发起流式生成请求，并把响应体切分为行。
//!
//! Upstream transport: opens the streaming generation request and exposes the
//! response body as a lazy stream of raw lines.

pub mod http;
pub mod lines;

pub use http::UpstreamClient;
pub use lines::decode_lines;

use crate::types::request::GenerateRequest;
use crate::BoxStream;

/// Lazy sequence of non-empty upstream lines. Dropping it releases the
/// underlying connection.
pub type LineStream = BoxStream<'static, Result<String, UpstreamError>>;

/// Anything that can start a streamed generation.
///
/// [`UpstreamClient`] is the production implementation; the HTTP edge only
/// depends on this trait.
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn open_stream(&self, request: &GenerateRequest) -> Result<LineStream, UpstreamError>;
}

/// Failures talking to the inference engine. The `Display` text of each
/// variant is what the caller sees in the terminal error frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("Cannot connect to Ollama at {url}. Error: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Ollama error: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Request timeout - AI model took too long to respond")]
    Timeout,

    /// An `{"error": ...}` line inside an otherwise successful stream.
    #[error("Ollama error: {0}")]
    Stream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl UpstreamError {
    /// Short machine-friendly label, used as a tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Unreachable { .. } => "unreachable",
            UpstreamError::Rejected { .. } => "rejected",
            UpstreamError::Timeout => "timeout",
            UpstreamError::Stream(_) => "stream_error",
            UpstreamError::Internal(_) => "internal",
        }
    }

    /// Classify a reqwest failure, whether raised while connecting or while
    /// reading the body.
    pub(crate) fn from_reqwest(base_url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Unreachable {
                url: base_url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}
