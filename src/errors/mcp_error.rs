use super::tool_error::ToolError;
use serde::Serialize;
use std::fmt;

/// JSON-RPC error codes the server answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct McpError {
    pub code: ErrorCode,
    pub message: String,
}

impl McpError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Rejected input maps to `InvalidParams`; anything else is internal.
    pub fn from_tool_error(tool: &str, error: &ToolError) -> Self {
        let error = error.redacted();
        let mut lines = vec![
            format!("tool: {}", tool),
            format!("code: {}", error.code),
            error.message.clone(),
        ];
        if let Some(hint) = &error.hint {
            lines.push(format!("hint: {}", hint));
        }
        let code = if error.kind.is_rejection() {
            ErrorCode::InvalidParams
        } else {
            ErrorCode::InternalError
        };
        Self::new(code, lines.join("\n"))
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for McpError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_become_invalid_params() {
        let err = ToolError::path_violation("Path /etc/shadow is outside the log roots")
            .with_hint("Use a path under /var/log.");
        let mapped = McpError::from_tool_error("read_log_file", &err);
        assert_eq!(mapped.code, ErrorCode::InvalidParams);
        assert_eq!(mapped.code.as_i32(), -32602);
        assert!(mapped.message.starts_with("tool: read_log_file\ncode: PATH_VIOLATION"));
        assert!(mapped.message.ends_with("hint: Use a path under /var/log."));
    }

    #[test]
    fn other_failures_are_internal_and_redacted() {
        let err = ToolError::not_found("no such file password=hunter2");
        let mapped = McpError::from_tool_error("tail_log_file", &err);
        assert_eq!(mapped.code, ErrorCode::InternalError);
        assert!(!mapped.message.contains("hunter2"));
    }
}
