//! 中继模块：把上游 NDJSON 行翻译为对外的流式帧。
//!
//! # Relay
//!
//! Turns the upstream line stream into the caller-facing frame stream.
//!
//! ```text
//! LineStream ─► UpstreamFrame::parse ─► Translator ─► fault guard ─► FrameStream
//!   (raw)          (skip non-JSON,       (accumulate,     (panic →
//!                   fail bad shape)       terminal)       error frame)
//! ```
//!
//! Every relay that terminates does so with exactly one terminal frame
//! ([`OutwardFrame::Final`] or [`OutwardFrame::Error`]); nothing follows it.
//! The one exception is an upstream stream that ends without ever signalling
//! completion: the frame stream then simply ends.

use crate::transport::{GenerationBackend, LineStream, UpstreamError};
use crate::types::frame::{OutwardFrame, UpstreamFrame};
use crate::types::request::GenerateRequest;
use crate::BoxStream;
use futures::{future, stream, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Outward frames for one relay.
pub type FrameStream = BoxStream<'static, OutwardFrame>;

/// Per-relay translation state. Owns the upstream lines and the accumulated text.
struct Translator {
    relay_id: Uuid,
    lines: LineStream,
    accumulated: String,
    tokens: usize,
    pending: Option<OutwardFrame>,
    finished: bool,
}

impl Translator {
    fn new(lines: LineStream, relay_id: Uuid) -> Self {
        Self {
            relay_id,
            lines,
            accumulated: String::new(),
            tokens: 0,
            pending: None,
            finished: false,
        }
    }

    async fn next_frame(&mut self) -> Option<OutwardFrame> {
        if let Some(frame) = self.pending.take() {
            return Some(frame);
        }
        if self.finished {
            return None;
        }

        loop {
            match self.lines.next().await {
                Some(Ok(line)) => match UpstreamFrame::parse(&line) {
                    Ok(frame) => {
                        if let Some(out) = self.apply(frame) {
                            return Some(out);
                        }
                    }
                    Err(err) if err.is_tolerated() => {
                        debug!(
                            relay_id = %self.relay_id,
                            line_len = line.len(),
                            "skipping malformed upstream line"
                        );
                    }
                    Err(err) => return Some(self.fail(UpstreamError::Internal(err.to_string()))),
                },
                Some(Err(err)) => return Some(self.fail(err)),
                None => {
                    warn!(
                        relay_id = %self.relay_id,
                        tokens = self.tokens,
                        "upstream stream ended without completion"
                    );
                    self.finish();
                    return None;
                }
            }
        }
    }

    fn apply(&mut self, frame: UpstreamFrame) -> Option<OutwardFrame> {
        let done = frame.is_done();

        if let Some(token) = frame.response {
            self.accumulated.push_str(&token);
            self.tokens += 1;
            if done {
                self.pending = Some(self.complete());
            }
            return Some(OutwardFrame::token(token, done));
        }

        if let Some(message) = frame.error {
            return Some(self.fail(UpstreamError::Stream(message)));
        }

        if done {
            return Some(self.complete());
        }

        None
    }

    fn complete(&mut self) -> OutwardFrame {
        info!(
            relay_id = %self.relay_id,
            tokens = self.tokens,
            chars = self.accumulated.chars().count(),
            "relay completed"
        );
        self.finish();
        OutwardFrame::final_response(std::mem::take(&mut self.accumulated))
    }

    fn fail(&mut self, err: UpstreamError) -> OutwardFrame {
        warn!(
            relay_id = %self.relay_id,
            error_kind = err.kind(),
            tokens = self.tokens,
            error = %err,
            "relay failed"
        );
        self.finish();
        OutwardFrame::error(err.to_string())
    }

    /// Stop consuming and release the upstream stream now rather than when
    /// the caller drops the frame stream.
    fn finish(&mut self) {
        self.finished = true;
        self.lines = Box::pin(stream::empty());
    }
}

fn translate_lines(lines: LineStream, relay_id: Uuid) -> FrameStream {
    Box::pin(stream::unfold(
        Translator::new(lines, relay_id),
        |mut t| async move {
            let frame = t.next_frame().await?;
            Some((frame, t))
        },
    ))
}

/// Translate an upstream line stream into outward frames.
pub fn translate(lines: LineStream) -> FrameStream {
    translate_with_id(lines, Uuid::new_v4())
}

/// [`translate`] with a caller-chosen relay id for log correlation.
pub fn translate_with_id(lines: LineStream, relay_id: Uuid) -> FrameStream {
    guard_faults(translate_lines(lines, relay_id), relay_id)
}

/// Open the upstream stream for `request` and translate it.
///
/// Nothing is sent upstream until the returned stream is first polled.
/// A failure to open becomes the single terminal error frame.
pub fn relay(
    backend: Arc<dyn GenerationBackend>,
    request: GenerateRequest,
    relay_id: Uuid,
) -> FrameStream {
    let opened = async move { backend.open_stream(&request).await };
    let frames = stream::once(opened).flat_map(move |result| match result {
        Ok(lines) => translate_lines(lines, relay_id),
        Err(err) => {
            warn!(
                relay_id = %relay_id,
                error_kind = err.kind(),
                error = %err,
                "failed to open upstream stream"
            );
            let frame = OutwardFrame::error(err.to_string());
            Box::pin(stream::once(future::ready(frame))) as FrameStream
        }
    });
    guard_faults(Box::pin(frames), relay_id)
}

/// Convert a panic anywhere below into one terminal internal-error frame.
fn guard_faults(frames: FrameStream, relay_id: Uuid) -> FrameStream {
    let guarded = AssertUnwindSafe(frames)
        .catch_unwind()
        .map(move |item| match item {
            Ok(frame) => frame,
            Err(payload) => {
                let err = UpstreamError::Internal(panic_message(payload.as_ref()));
                warn!(relay_id = %relay_id, error = %err, "relay aborted by internal fault");
                OutwardFrame::error(err.to_string())
            }
        });
    Box::pin(guarded)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected fault".to_string()
    }
}

