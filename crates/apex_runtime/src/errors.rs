use serde::{Deserialize, Serialize};
use std::fmt;

/// Main result type for analysis runtime operations
pub type ApexResult<T> = Result<T, ApexError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ErrorCode {
    // General Errors
    Unknown,
    Timeout,

    // Config & Input
    ConfigError,
    InvalidTier,
    EmptyProblemStatement,
    ProblemStatementOutOfRange,

    // Gateway Errors
    GatewayError,
    GatewayAuthentication,
    GatewayInvalidRequest,
    GatewayInvalidResponse,
    GatewayRateLimited,

    // Storage Errors
    SessionNotFound,
    StorageError,

    // Serialization Errors
    SerializationError,

    // Network Errors
    NetworkError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ErrorCategory {
    System,
    Configuration,
    Gateway,
    Storage,
    Analysis,
    Network,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct ApexError {
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
}

impl ApexError {
    pub fn new(
        code: ErrorCode,
        category: ErrorCategory,
        severity: ErrorSeverity,
        message: &str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            message: message.to_string(),
        }
    }

    pub fn config(message: &str) -> Self {
        Self::new(
            ErrorCode::ConfigError,
            ErrorCategory::Configuration,
            ErrorSeverity::High,
            message,
        )
    }

    pub fn storage(message: &str) -> Self {
        Self::new(
            ErrorCode::StorageError,
            ErrorCategory::Storage,
            ErrorSeverity::High,
            message,
        )
    }

    pub fn session_not_found(session_id: &str) -> Self {
        Self::new(
            ErrorCode::SessionNotFound,
            ErrorCategory::Storage,
            ErrorSeverity::Medium,
            &format!("Analysis session '{}' not found", session_id),
        )
    }

    /// Maps a gateway HTTP status and response body onto the taxonomy.
    pub fn from_gateway_status(status: u16, body: &str) -> Self {
        let (code, severity) = match status {
            400 => (ErrorCode::GatewayInvalidRequest, ErrorSeverity::Medium),
            401 | 403 => (ErrorCode::GatewayAuthentication, ErrorSeverity::Critical),
            429 => (ErrorCode::GatewayRateLimited, ErrorSeverity::Medium),
            500..=599 => (ErrorCode::GatewayError, ErrorSeverity::High),
            _ => (ErrorCode::GatewayError, ErrorSeverity::Medium),
        };
        Self::new(
            code,
            ErrorCategory::Gateway,
            severity,
            &format!("Gateway API error ({}): {}", status, body),
        )
    }

    pub fn is_retriable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::GatewayError
                | ErrorCode::GatewayRateLimited
                | ErrorCode::NetworkError
                | ErrorCode::Timeout
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.code, ErrorCode::Timeout)
    }
}

impl fmt::Display for ApexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.category, self.code, self.message)
    }
}

impl std::error::Error for ApexError {}

impl From<serde_json::Error> for ApexError {
    fn from(err: serde_json::Error) -> Self {
        ApexError::new(
            ErrorCode::SerializationError,
            ErrorCategory::System,
            ErrorSeverity::Medium,
            &format!("JSON serialization error: {}", err),
        )
    }
}

impl From<reqwest::Error> for ApexError {
    fn from(err: reqwest::Error) -> Self {
        let (code, severity) = if err.is_timeout() {
            (ErrorCode::Timeout, ErrorSeverity::High)
        } else {
            (ErrorCode::NetworkError, ErrorSeverity::High)
        };
        ApexError::new(
            code,
            ErrorCategory::Network,
            severity,
            &format!("Gateway transport error: {}", err),
        )
    }
}
