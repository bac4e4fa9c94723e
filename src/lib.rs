//! # chat-relay
//!
//! 鉴权 HTTP 网关：把聊天请求转发到本地推理引擎，并以 NDJSON 流式回传生成结果。
//!
//! Authenticated HTTP gateway that forwards chat prompts to a local inference
//! engine (an Ollama-style `/api/generate` endpoint) and relays the generated
//! tokens back to the caller as newline-delimited JSON.
//!
//! ## Overview
//!
//! ```text
//! POST /api/chat ─► ApiKeyVerifier ─► UpstreamClient ─► LineStream
//!                                                          │
//!        caller ◄── NDJSON body ◄── OutwardFrame ◄── relay::translate
//! ```
//!
//! - **Streaming-first**: every token is flushed to the caller as soon as the
//!   upstream produces it.
//! - **In-band failures**: once the `200` has been sent, upstream failures are
//!   reported as a single terminal `{"error": ...}` frame.
//! - **Tolerant decoding**: malformed upstream lines are skipped, not fatal.
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Immutable gateway configuration |
//! | [`auth`] | Static API key verification |
//! | [`transport`] | Streaming upstream client and line decoding |
//! | [`relay`] | Upstream frame → outward frame translation |
//! | [`server`] | axum router, handlers and pre-stream errors |
//! | [`types`] | Request and frame types |

pub mod auth;
pub mod config;
pub mod relay;
pub mod server;
pub mod transport;
pub mod types;

pub use auth::{ApiKeyVerifier, AuthError, API_KEY_HEADER};
pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use server::{build_router, AppState};
pub use transport::{GenerationBackend, UpstreamClient, UpstreamError};
pub use types::{
    frame::{FrameError, OutwardFrame, UpstreamFrame},
    request::{ChatRequest, GenerateRequest, GenerationOptions},
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed, sendable stream.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::Error;
