//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit code.

use std::fmt;
use std::io;

use crate::attribute::{AttributeError, AttributeErrorCode};

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error
    IoError,
    /// Data file already exists
    AlreadyInitialized,
    /// Data file missing or empty
    NoData,
    /// Data file failed validation
    Corruption,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::AlreadyInitialized => "AERO_CLI_ALREADY_INITIALIZED",
            Self::NoData => "AERO_CLI_NO_DATA",
            Self::Corruption => "AERO_CLI_CORRUPTION",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Data file already present
    pub fn already_initialized(path: &std::path::Path) -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            format!("Attribute data already exists: {}", path.display()),
        )
    }

    /// Nothing to load
    pub fn no_data(path: &std::path::Path) -> Self {
        Self::new(
            CliErrorCode::NoData,
            format!("No attribute data in {}", path.display()),
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<AttributeError> for CliError {
    fn from(e: AttributeError) -> Self {
        let code = match e.code() {
            AttributeErrorCode::AeroAttributeConfigInvalid => CliErrorCode::ConfigError,
            AttributeErrorCode::AeroAttributeIoError => CliErrorCode::IoError,
            AttributeErrorCode::AeroAttributeCorruption => CliErrorCode::Corruption,
        };
        Self::new(code, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::config_error("bad name");
        assert_eq!(err.to_string(), "AERO_CLI_CONFIG_ERROR: bad name");
    }

    #[test]
    fn test_attribute_error_mapping() {
        let err: CliError = AttributeError::corruption(3, "short payload").into();
        assert_eq!(err.code(), &CliErrorCode::Corruption);

        let err: CliError = AttributeError::config_invalid("enumerated").into();
        assert_eq!(err.code_str(), "AERO_CLI_CONFIG_ERROR");
    }
}
