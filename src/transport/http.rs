use super::{decode_lines, GenerationBackend, LineStream, UpstreamError};
use crate::config::GatewayConfig;
use crate::types::request::GenerateRequest;
use crate::{Error, Result};
use futures::TryStreamExt;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Streaming client for the inference engine's `/api/generate` endpoint.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    generate_url: String,
}

impl UpstreamClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.upstream_url.as_str().trim_end_matches('/').to_string(),
            generate_url: config.generate_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the generation request and return the body as lines.
    ///
    /// Errors here happen before any byte of output exists; errors while the
    /// body is being read surface as `Err` items on the returned stream.
    pub async fn stream_generate(
        &self,
        request: &GenerateRequest,
    ) -> std::result::Result<LineStream, UpstreamError> {
        let start = Instant::now();
        let resp = self
            .client
            .post(&self.generate_url)
            .header("accept", "application/x-ndjson")
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(&self.base_url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.ok();
            let detail = rejection_detail(status.as_u16(), body.as_deref());
            info!(
                http_status = status.as_u16(),
                model = request.model(),
                duration_ms = start.elapsed().as_millis(),
                "upstream rejected generation request"
            );
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        debug!(
            http_status = status.as_u16(),
            model = request.model(),
            ttfb_ms = start.elapsed().as_millis(),
            "upstream stream opened"
        );

        let base_url = self.base_url.clone();
        let bytes = resp
            .bytes_stream()
            .map_err(move |e| UpstreamError::from_reqwest(&base_url, e));
        Ok(decode_lines(bytes))
    }
}

#[async_trait::async_trait]
impl GenerationBackend for UpstreamClient {
    async fn open_stream(
        &self,
        request: &GenerateRequest,
    ) -> std::result::Result<LineStream, UpstreamError> {
        self.stream_generate(request).await
    }
}

/// Pick the most useful detail out of a non-2xx response.
///
/// A JSON object's `error` field wins; a JSON body without one is passed
/// through verbatim; anything else (unreadable, not JSON) falls back to the
/// status code.
pub(crate) fn rejection_detail(status: u16, body: Option<&str>) -> String {
    let Some(body) = body else {
        return status.to_string();
    };
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => status.to_string(),
    }
}
