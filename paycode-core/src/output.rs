//! Output helpers for human and agent modes.

use serde::Serialize;

use crate::error::ErrorCode;

/// Human (TTY) vs Agent (non-interactive) output selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Agent,
}

/// Agent-mode error payload, written to stderr as one JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct AgentError {
    pub error: String,
    pub code: u16,
    pub name: String,
    pub message: String,
}

impl AgentError {
    pub fn new(error: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.code(),
            name: code.name().to_string(),
            message: message.into(),
        }
    }
}

/// Shorten long payment codes for tables: `lnurl1...wxyz`.
pub fn truncate_code(code: &str) -> String {
    let s = code.trim();
    if s.chars().count() <= 16 {
        return s.to_string();
    }

    let start: String = s.chars().take(8).collect();
    let end: String = s
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    format!("{start}...{end}")
}
