//! Error handling for Keel Core.
//!
//! The resilience components never fail for input inside their documented
//! domain: stale events, duplicate keys, bad thresholds and unknown streams are
//! all normalized. `KeelError` therefore only surfaces from the ambient layer:
//!
//! - Loading and decoding configuration
//! - Decoding event, vote and snapshot documents handed in by a caller
//! - I/O performed by tooling built on top of the core
//!
//! # Usage
//!
//! ```rust,ignore
//! use keel_core::error::{ErrorContext, Result};
//!
//! fn read_batch(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).context("Failed to read event batch")
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::telemetry::metrics::ERRORS_TOTAL;

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Keel operations.
pub type Result<T> = std::result::Result<T, KeelError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input Errors (1000-1099)
    InvalidInput,
    DeserializationError,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    InvalidConfiguration,

    // Environment Errors (6000-6099)
    IoError,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::InvalidInput => 1000,
            Self::DeserializationError => 1001,
            Self::ConfigurationError => 5000,
            Self::InvalidConfiguration => 5001,
            Self::IoError => 6000,
            Self::InternalError => 9000,
        }
    }

    /// Get the category this code belongs to.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput | Self::DeserializationError => "input",
            Self::ConfigurationError | Self::InvalidConfiguration => "configuration",
            Self::IoError => "io",
            Self::InternalError => "internal",
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::IoError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad documents, bad arguments)
    Low,
    /// Operational issues (unreadable files)
    Medium,
    /// Misconfiguration that prevents startup
    High,
    /// Broken invariants inside the core
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::InvalidInput | ErrorCode::DeserializationError => Self::Low,
            ErrorCode::IoError => Self::Medium,
            ErrorCode::ConfigurationError | ErrorCode::InvalidConfiguration => Self::High,
            ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Keel Core.
#[derive(Error, Debug)]
pub struct KeelError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-facing message
    message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for KeelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl KeelError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and message.
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            message: message.into(),
            internal_message: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "Keel error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    "Keel error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    message = %self.message,
                    "Keel error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            ERRORS_TOTAL,
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| KeelError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| KeelError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| KeelError::invalid_input(message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| KeelError::new(code, "Value missing"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<config::ConfigError> for KeelError {
    fn from(error: config::ConfigError) -> Self {
        let code = match &error {
            config::ConfigError::NotFound(_) | config::ConfigError::Foreign(_) => {
                ErrorCode::ConfigurationError
            }
            _ => ErrorCode::InvalidConfiguration,
        };
        KeelError::with_internal(code, "Failed to load configuration", error.to_string())
            .with_source(error)
    }
}

impl From<serde_json::Error> for KeelError {
    fn from(error: serde_json::Error) -> Self {
        KeelError::with_internal(
            ErrorCode::DeserializationError,
            "Failed to decode JSON document",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<std::io::Error> for KeelError {
    fn from(error: std::io::Error) -> Self {
        KeelError::with_internal(ErrorCode::IoError, "I/O operation failed", error.to_string())
            .with_source(error)
    }
}
