//! 类型模块：入站请求、上游请求与流式帧的数据类型。
//!
//! # Types Module
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatRequest`] | Inbound `POST /api/chat` body |
//! | [`GenerateRequest`] | Upstream generation request (always streaming) |
//! | [`GenerationOptions`] | Fixed sampling parameters sent upstream |
//! | [`UpstreamFrame`] | One parsed upstream NDJSON line |
//! | [`OutwardFrame`] | One NDJSON frame sent to the caller |
//!
//! ## Example
//!
//! ```rust
//! use chat_relay::types::{ChatRequest, GenerateRequest, GenerationOptions, OutwardFrame};
//!
//! let chat = ChatRequest::new("Why is the sky blue?");
//! let req = GenerateRequest::new("tinyllama", chat.prompt(), GenerationOptions::default());
//! assert!(req.stream());
//!
//! let frame = OutwardFrame::token("Hel", false);
//! assert_eq!(frame.to_ndjson_line().unwrap(), "{\"token\":\"Hel\",\"done\":false}\n");
//! ```

pub mod frame;
pub mod request;

pub use frame::{FrameError, OutwardFrame, UpstreamFrame};
pub use request::{ChatRequest, GenerateRequest, GenerationOptions};
