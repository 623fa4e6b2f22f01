use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Format,
    Io,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Wraps a parser failure, keeping the whole `anyhow` context chain.
    pub fn format(err: anyhow::Error) -> Self {
        Self::new(ErrorCode::Format, format!("{err:#}"))
    }

    pub fn io(path: &str, action: &str, err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::NotFound,
            _ => ErrorCode::Io,
        };
        Self::new(code, format!("Could not {action} '{path}': {err}"))
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::new(ErrorCode::Io, err.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::new(ErrorCode::Internal, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = ToolError::new(ErrorCode::Format, "bad location");
        assert_eq!(err.to_string(), "Format: bad location");
    }

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ToolError::io("x.embl", "read EMBL file", io);
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("x.embl"));
    }

    #[test]
    fn test_format_keeps_context_chain() {
        let inner = anyhow::anyhow!("line 3: no ID");
        let err = ToolError::format(inner.context("Could not parse EMBL file 'a.embl'"));
        assert!(err.message.contains("a.embl"));
        assert!(err.message.contains("line 3"));
    }
}
