//! 网关配置：进程启动时构建一次，之后只读。
//!
//! Gateway configuration, built once at process start and shared read-only.

use crate::types::request::GenerationOptions;
use crate::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use url::Url;

pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "tinyllama";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Immutable gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    pub upstream_url: Url,
    pub model: String,
    pub api_key: String,
    pub host: IpAddr,
    pub port: u16,
    /// Wall-clock bound on the whole upstream exchange, body included.
    pub request_timeout: Duration,
    pub generation: GenerationOptions,
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Full URL of the upstream generation endpoint.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/api/generate",
            self.upstream_url.as_str().trim_end_matches('/')
        )
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("upstream_url", &self.upstream_url.as_str())
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Builder for [`GatewayConfig`].
///
/// Everything has a default except the API key, which [`build`](Self::build)
/// refuses to go without.
pub struct GatewayConfigBuilder {
    upstream_url: String,
    model: String,
    api_key: Option<String>,
    host: IpAddr,
    port: u16,
    request_timeout: Duration,
    generation: GenerationOptions,
}

impl GatewayConfigBuilder {
    pub fn new() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            generation: GenerationOptions::default(),
        }
    }

    pub fn upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn maybe_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn generation(mut self, options: GenerationOptions) -> Self {
        self.generation = options;
        self
    }

    pub fn build(self) -> Result<GatewayConfig> {
        let api_key = match self.api_key {
            Some(k) if !k.is_empty() => k,
            _ => {
                return Err(Error::configuration_field(
                    "api_key",
                    "API_KEY environment variable must be set for API security",
                ))
            }
        };

        let upstream_url = Url::parse(&self.upstream_url).map_err(|e| {
            Error::configuration_field(
                "upstream_url",
                format!("invalid upstream URL '{}': {}", self.upstream_url, e),
            )
        })?;
        if !matches!(upstream_url.scheme(), "http" | "https") {
            return Err(Error::configuration_field(
                "upstream_url",
                format!("unsupported scheme '{}'", upstream_url.scheme()),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(Error::configuration_field("model", "model must not be empty"));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::configuration_field(
                "request_timeout",
                "timeout must be greater than zero",
            ));
        }

        Ok(GatewayConfig {
            upstream_url,
            model: self.model,
            api_key,
            host: self.host,
            port: self.port,
            request_timeout: self.request_timeout,
            generation: self.generation,
        })
    }
}

impl Default for GatewayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
