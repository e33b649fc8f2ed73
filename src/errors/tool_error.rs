use crate::utils::redact::redact_text;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidParams,
    PathViolation,
    PatternRejected,
    PatternTimeout,
    NotFound,
    PermissionDenied,
    OutOfRange,
    ConnectionTimeout,
    ConnectionLost,
    CommandTimeout,
    TooLarge,
    DecodeError,
    SniffFailure,
    Internal,
}

impl ToolErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ToolErrorKind::InvalidParams => "INVALID_PARAMS",
            ToolErrorKind::PathViolation => "PATH_VIOLATION",
            ToolErrorKind::PatternRejected => "PATTERN_REJECTED",
            ToolErrorKind::PatternTimeout => "PATTERN_TIMEOUT",
            ToolErrorKind::NotFound => "NOT_FOUND",
            ToolErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ToolErrorKind::OutOfRange => "OUT_OF_RANGE",
            ToolErrorKind::ConnectionTimeout => "CONNECTION_TIMEOUT",
            ToolErrorKind::ConnectionLost => "CONNECTION_LOST",
            ToolErrorKind::CommandTimeout => "COMMAND_TIMEOUT",
            ToolErrorKind::TooLarge => "TOO_LARGE",
            ToolErrorKind::DecodeError => "DECODE_ERROR",
            ToolErrorKind::SniffFailure => "SNIFF_FAILURE",
            ToolErrorKind::Internal => "INTERNAL",
        }
    }

    /// Input-shape and security rejections; these never carry a partial result.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            ToolErrorKind::InvalidParams
                | ToolErrorKind::PathViolation
                | ToolErrorKind::PatternRejected
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code().to_string(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(
                kind,
                ToolErrorKind::ConnectionTimeout
                    | ToolErrorKind::ConnectionLost
                    | ToolErrorKind::CommandTimeout
            ),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Copy with message and hint scrubbed of credential-like values.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        out.message = redact_text(&self.message, usize::MAX, None);
        out.hint = self
            .hint
            .as_deref()
            .map(|hint| redact_text(hint, usize::MAX, None));
        out
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidParams, message)
    }

    pub fn path_violation(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::PathViolation, message)
    }

    pub fn pattern_rejected(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::PatternRejected, message)
    }

    pub fn pattern_timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::PatternTimeout, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::PermissionDenied, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::OutOfRange, message)
    }

    pub fn connection_timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ConnectionTimeout, message)
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ConnectionLost, message)
    }

    pub fn command_timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::CommandTimeout, message)
    }

    pub fn too_large(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::TooLarge, message)
    }

    pub fn decode_error(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::DecodeError, message)
    }

    pub fn sniff_failure(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::SniffFailure, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ToolError::not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => ToolError::permission_denied(err.to_string()),
            std::io::ErrorKind::TimedOut => ToolError::connection_timeout(err.to_string()),
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => ToolError::connection_lost(err.to_string()),
            _ => ToolError::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_scrubs_inline_credentials() {
        let err = ToolError::internal("connect failed: password=hunter22 host=db1");
        let clean = err.redacted();
        assert!(!clean.message.contains("hunter22"));
        assert!(clean.message.contains("host=db1"));
        assert_eq!(clean.code, "INTERNAL");
    }

    #[test]
    fn transport_kinds_are_retryable() {
        assert!(ToolError::connection_timeout("t").retryable);
        assert!(ToolError::command_timeout("t").retryable);
        assert!(!ToolError::path_violation("p").retryable);
    }
}
