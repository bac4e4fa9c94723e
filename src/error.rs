use thiserror::Error;

/// Unified error type for the gateway.
///
/// Request-time failures that reach a caller are expressed either as an
/// [`ApiError`](crate::server::ApiError) (before streaming) or as an in-band
/// error frame (after). This type covers startup: configuration and binding.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_field(.field))]
    Configuration {
        message: String,
        field: Option<&'static str>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_field(field: &Option<&'static str>) -> String {
    match field {
        Some(f) => format!(" (field: {})", f),
        None => String::new(),
    }
}

impl Error {
    /// Configuration error not tied to a single setting.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            field: None,
        }
    }

    /// Configuration error for a named setting (e.g. `"api_key"`).
    pub fn configuration_field(field: &'static str, msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            field: Some(field),
        }
    }
}
