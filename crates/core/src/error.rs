//! Error types for the manual search core
//!
//! This module defines the unified error type for all tool operations.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Error Model
//!
//! Error kinds are flat, not hierarchical. Input validation errors are
//! produced locally and returned directly, never mapped onto each other.
//! `conflict` is reserved for precondition failures reported by adjacent
//! subsystems; the retrieval core never synthesizes it.
//!
//! ### Canonical Error Codes (Frozen)
//!
//! | Code | Description |
//! |------|-------------|
//! | invalid_parameter | Caller input failed validation |
//! | invalid_path | Path syntax invalid (absolute, traversal, empty) |
//! | out_of_scope | Resolved path escapes its root |
//! | needs_narrow_scope | Request matches too much material |
//! | not_found | Unknown manual, file, or expired trace |
//! | forbidden | Symlink access or disallowed scope |
//! | invalid_scope | Scope value not applicable to the target |
//! | conflict | Precondition failure from an adjacent subsystem |
//!
//! ### Wire Encoding
//!
//! All errors encode to JSON as:
//! ```json
//! {
//!   "code": "not_found",
//!   "message": "trace_id not found",
//!   "details": { "trace_id": "...", "reason": "expired" }
//! }
//! ```

use serde_json::Value;
use thiserror::Error;

// =============================================================================
// ErrorCode - Canonical Wire Error Codes (Frozen)
// =============================================================================

/// Canonical error codes for wire encoding
///
/// These 8 codes are the stable wire representation of all tool errors.
/// They are frozen and will not change without a major version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Caller input failed validation
    InvalidParameter,
    /// Path syntax invalid (absolute, traversal, empty)
    InvalidPath,
    /// Resolved path escapes its root
    OutOfScope,
    /// Request matches too much material
    NeedsNarrowScope,
    /// Unknown manual, file, or expired trace
    NotFound,
    /// Symlink access or disallowed scope
    Forbidden,
    /// Scope value not applicable to the target
    InvalidScope,
    /// Precondition failure from an adjacent subsystem
    Conflict,
}

impl ErrorCode {
    /// Get the canonical string representation for wire encoding
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParameter => "invalid_parameter",
            ErrorCode::InvalidPath => "invalid_path",
            ErrorCode::OutOfScope => "out_of_scope",
            ErrorCode::NeedsNarrowScope => "needs_narrow_scope",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::InvalidScope => "invalid_scope",
            ErrorCode::Conflict => "conflict",
        }
    }

    /// Parse an error code from its string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invalid_parameter" => Some(ErrorCode::InvalidParameter),
            "invalid_path" => Some(ErrorCode::InvalidPath),
            "out_of_scope" => Some(ErrorCode::OutOfScope),
            "needs_narrow_scope" => Some(ErrorCode::NeedsNarrowScope),
            "not_found" => Some(ErrorCode::NotFound),
            "forbidden" => Some(ErrorCode::Forbidden),
            "invalid_scope" => Some(ErrorCode::InvalidScope),
            "conflict" => Some(ErrorCode::Conflict),
            _ => None,
        }
    }
}

// =============================================================================
// ToolError
// =============================================================================

/// Unified error type for all tool operations
///
/// Carries the frozen wire code, a one-line message, and optional
/// structured details. Constructors exist per code so call sites stay
/// one-liners.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{}: {message}", .code.as_str())]
pub struct ToolError {
    /// Frozen wire code
    pub code: ErrorCode,
    /// One-line human-readable message
    pub message: String,
    /// Optional structured details (e.g. the offending path or trace id)
    pub details: Option<Value>,
}

impl ToolError {
    /// Create an error with an explicit code
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ToolError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Builder: attach structured details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Shorthand: `invalid_parameter`
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParameter, message)
    }

    /// Shorthand: `invalid_path`
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPath, message)
    }

    /// Shorthand: `out_of_scope`
    pub fn out_of_scope(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OutOfScope, message)
    }

    /// Shorthand: `not_found`
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand: `forbidden`
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Shorthand: `invalid_scope`
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidScope, message)
    }

    /// Encode to the canonical wire JSON shape
    pub fn to_wire(&self) -> Value {
        let mut obj = serde_json::json!({
            "code": self.code.as_str(),
            "message": self.message,
        });
        if let Some(details) = &self.details {
            obj["details"] = details.clone();
        }
        obj
    }
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, ToolError>;

/// Raise `err` unless `condition` holds
///
/// Mirrors the validation style used throughout the pipeline: guards read
/// as a single line at the top of each operation.
pub fn ensure(condition: bool, err: ToolError) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(err)
    }
}

// =============================================================================
// Tests
// =============================================================================
