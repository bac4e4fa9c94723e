//! Upstream and outward streaming frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of the upstream NDJSON stream, e.g.
/// `{"model":"tinyllama","response":"Hel","done":false}`.
///
/// Unknown fields (model, timings, context...) are ignored. `done` follows
/// JSON truthiness: `false`, `0`, `""`, `null` and empty containers are false.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamFrame {
    /// Present whenever the line has a `response` key.
    pub response: Option<String>,
    pub done: bool,
    /// Engine-reported failure; `null` counts as absent.
    pub error: Option<String>,
}

/// Why a line could not become an [`UpstreamFrame`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// Not JSON at all. Tolerated: engines emit transient partial lines.
    #[error("malformed upstream line: {0}")]
    Malformed(String),

    #[error("upstream line is not a JSON object (got {0})")]
    NotAnObject(&'static str),

    #[error("upstream `response` is not a string (got {0})")]
    ResponseNotString(&'static str),
}

impl FrameError {
    /// Only lines that fail to parse as JSON are skipped; valid JSON of the
    /// wrong shape ends the relay.
    pub fn is_tolerated(&self) -> bool {
        matches!(self, FrameError::Malformed(_))
    }
}

impl UpstreamFrame {
    pub fn parse(line: &str) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| FrameError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => return Err(FrameError::NotAnObject(json_kind(&other))),
        };

        let response = match fields.remove("response") {
            None => None,
            Some(Value::String(token)) => Some(token),
            Some(other) => return Err(FrameError::ResponseNotString(json_kind(&other))),
        };
        let done = fields.get("done").is_some_and(is_truthy);
        let error = match fields.remove("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(message)) => Some(message),
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            response,
            done,
            error,
        })
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A frame written to the caller, one JSON object per line.
///
/// Serialized without a discriminator; the field set identifies the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutwardFrame {
    /// Incremental text: `{"token": "...", "done": false}`
    Token { token: String, done: bool },
    /// Terminal aggregate: `{"response": "...", "done": true}`
    Final { response: String, done: bool },
    /// Terminal failure: `{"error": "..."}`
    Error { error: String },
}

impl OutwardFrame {
    pub fn token(token: impl Into<String>, done: bool) -> Self {
        OutwardFrame::Token {
            token: token.into(),
            done,
        }
    }

    pub fn final_response(response: impl Into<String>) -> Self {
        OutwardFrame::Final {
            response: response.into(),
            done: true,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OutwardFrame::Error {
            error: message.into(),
        }
    }

    /// Final and Error frames end a relay.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutwardFrame::Token { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, OutwardFrame::Error { .. })
    }

    /// Serialize as a single NDJSON line, trailing newline included.
    pub fn to_ndjson_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
