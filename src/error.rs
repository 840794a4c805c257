use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the pipeline core and its stage adapters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Bad caller input
    #[error("Invalid value for `{field}`: {message}")]
    Validation { field: String, message: String },

    /// Network failure, timeout or non-success status from a remote service
    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Remote service answered but required fields are missing or mistyped
    #[error("Upstream response missing required data: {0}")]
    UpstreamSchemaViolation(String),

    /// No recoverable structured payload in the model text
    #[error("Upstream returned unparsable output: {0}")]
    UpstreamFormat(String),

    #[error("Input too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation { .. } => ErrorKind::Validation,
            PipelineError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            PipelineError::UpstreamSchemaViolation(_) => ErrorKind::UpstreamSchemaViolation,
            PipelineError::UpstreamFormat(_) => ErrorKind::UpstreamFormat,
            PipelineError::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
            PipelineError::UnsupportedMediaType(_) => ErrorKind::UnsupportedMediaType,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::UpstreamUnavailable(format!("request timed out: {}", err))
        } else {
            PipelineError::UpstreamUnavailable(err.to_string())
        }
    }
}

/// Error category carried by a failed stage and mapped to the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UpstreamUnavailable,
    UpstreamSchemaViolation,
    UpstreamFormat,
    PayloadTooLarge,
    UnsupportedMediaType,
    Internal,
}

impl ErrorKind {
    /// Wire error code used in the envelope
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamSchemaViolation => "upstream_schema_violation",
            ErrorKind::UpstreamFormat => "upstream_format_error",
            ErrorKind::PayloadTooLarge => "request_too_large",
            ErrorKind::UnsupportedMediaType => "invalid_content_type",
            ErrorKind::Internal => "internal_error",
        }
    }

    /// HTTP-style status for the envelope
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation
            | ErrorKind::UpstreamUnavailable
            | ErrorKind::UpstreamSchemaViolation
            | ErrorKind::UpstreamFormat => 400,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::UnsupportedMediaType => 415,
            ErrorKind::Internal => 500,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
