use super::{ApiError, AppState};
use crate::relay::{self, FrameStream};
use crate::types::frame::OutwardFrame;
use crate::types::request::{ChatRequest, GenerateRequest};
use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "message": "AI Chat API is running"}))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    state.verifier.verify_headers(&headers)?;

    let Json(request) = payload?;
    if request.is_blank() {
        return Err(ApiError::EmptyMessage);
    }

    let relay_id = Uuid::new_v4();
    let upstream = GenerateRequest::new(
        state.config.model.as_str(),
        request.prompt(),
        state.config.generation.clone(),
    );
    info!(
        relay_id = %relay_id,
        model = %state.config.model,
        prompt_chars = request.prompt().chars().count(),
        "starting relay"
    );

    let frames = relay::relay(state.backend.clone(), upstream, relay_id);
    Ok(ndjson_response(frames))
}

/// Stream frames as an `application/x-ndjson` body, one line per frame.
pub fn ndjson_response(frames: FrameStream) -> Response {
    let body = frames.map(|frame| Ok::<_, Infallible>(Bytes::from(encode_frame(&frame))));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(NDJSON_CONTENT_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

fn encode_frame(frame: &OutwardFrame) -> String {
    match frame.to_ndjson_line() {
        Ok(line) => line,
        Err(e) => {
            error!("failed to encode outward frame: {}", e);
            let mut line = json!({"error": format!("Internal server error: {}", e)}).to_string();
            line.push('\n');
            line
        }
    }
}
