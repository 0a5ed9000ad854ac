//! Attribute error types
//!
//! Error codes:
//! - AERO_ATTRIBUTE_IO_ERROR (ERROR severity)
//! - AERO_ATTRIBUTE_CONFIG_INVALID (ERROR severity)
//! - AERO_ATTRIBUTE_CORRUPTION (FATAL severity)
//!
//! Contract violations that only the writer itself can cause (shrinking an
//! ineligible lid space, clearing an out-of-range span, saving to an
//! enumerated target) are not represented here. Those panic.

use std::fmt;
use std::io;

use thiserror::Error;

/// Severity levels for attribute errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, process continues
    Error,
    /// The process must halt
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Attribute-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeErrorCode {
    /// Disk or stream I/O failure
    AeroAttributeIoError,
    /// Configuration rejected
    AeroAttributeConfigInvalid,
    /// Persisted payload does not match its header
    AeroAttributeCorruption,
}

impl AttributeErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            AttributeErrorCode::AeroAttributeIoError => "AERO_ATTRIBUTE_IO_ERROR",
            AttributeErrorCode::AeroAttributeConfigInvalid => "AERO_ATTRIBUTE_CONFIG_INVALID",
            AttributeErrorCode::AeroAttributeCorruption => "AERO_ATTRIBUTE_CORRUPTION",
        }
    }

    /// Returns the severity level for this code
    pub fn severity(&self) -> Severity {
        match self {
            AttributeErrorCode::AeroAttributeCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for AttributeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Attribute error with code and context
#[derive(Debug, Error)]
pub enum AttributeError {
    /// I/O failure while reading or writing attribute data
    #[error("[ERROR] AERO_ATTRIBUTE_IO_ERROR: {message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    /// Configuration could not be read or failed validation
    #[error("[ERROR] AERO_ATTRIBUTE_CONFIG_INVALID: {0}")]
    ConfigInvalid(String),

    /// Persisted data is inconsistent with its header
    #[error("[FATAL] AERO_ATTRIBUTE_CORRUPTION: {message} (doc_count: {doc_count})")]
    Corruption { message: String, doc_count: u32 },
}

impl AttributeError {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        AttributeError::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        AttributeError::ConfigInvalid(message.into())
    }

    /// Create a corruption error (FATAL)
    pub fn corruption(doc_count: u32, message: impl Into<String>) -> Self {
        AttributeError::Corruption {
            message: message.into(),
            doc_count,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> AttributeErrorCode {
        match self {
            AttributeError::Io { .. } => AttributeErrorCode::AeroAttributeIoError,
            AttributeError::ConfigInvalid(_) => AttributeErrorCode::AeroAttributeConfigInvalid,
            AttributeError::Corruption { .. } => AttributeErrorCode::AeroAttributeCorruption,
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// Returns whether this error requires the process to halt
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for attribute operations
pub type AttributeResult<T> = Result<T, AttributeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AttributeErrorCode::AeroAttributeIoError.code(),
            "AERO_ATTRIBUTE_IO_ERROR"
        );
        assert_eq!(
            AttributeErrorCode::AeroAttributeConfigInvalid.code(),
            "AERO_ATTRIBUTE_CONFIG_INVALID"
        );
        assert_eq!(
            AttributeErrorCode::AeroAttributeCorruption.code(),
            "AERO_ATTRIBUTE_CORRUPTION"
        );
    }

    #[test]
    fn test_only_corruption_is_fatal() {
        let io_err = AttributeError::io(
            "read failed",
            io::Error::new(io::ErrorKind::Other, "boom"),
        );
        assert!(!io_err.is_fatal());
        assert!(!AttributeError::config_invalid("bad").is_fatal());
        assert!(AttributeError::corruption(10, "short payload").is_fatal());
    }

    #[test]
    fn test_display_contains_code_and_context() {
        let err = AttributeError::corruption(42, "payload truncated");
        let display = err.to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("AERO_ATTRIBUTE_CORRUPTION"));
        assert!(display.contains("payload truncated"));
        assert!(display.contains("doc_count: 42"));
    }

    #[test]
    fn test_io_error_exposes_source() {
        use std::error::Error as _;
        let err = AttributeError::io(
            "open failed",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.source().is_some());
        assert_eq!(err.code(), AttributeErrorCode::AeroAttributeIoError);
    }
}
