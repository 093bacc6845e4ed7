//! Unified error types for Hawala TON Core
//!
//! All errors flow through this module. Every `ErrorCode` belongs to one
//! `ErrorCategory`, and callers decide on retries from the category alone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all Hawala operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HawalaError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl HawalaError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Only transient failures may be retried
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn invalid_mnemonic(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidMnemonic, msg)
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, msg)
    }

    pub fn code_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CodeUnavailable, msg)
    }

    pub fn message_rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MessageRejected, msg)
    }

    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, msg)
    }

    pub fn provider_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderUnavailable, msg)
    }

    pub fn circuit_open(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CircuitOpen, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthenticationFailed, msg)
    }

    pub fn wallet_locked(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WalletLocked, msg)
    }

    pub fn query_id_exhausted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueryIdExhausted, msg)
    }

    pub fn batch_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BatchTooLarge, msg)
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }
}

impl fmt::Display for HawalaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for HawalaError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Derivation errors
    InvalidInput,
    InvalidAddress,
    InvalidMnemonic,
    InvalidPublicKey,
    CryptoError,
    CellOverflow,
    CellUnderflow,
    InvalidBoc,
    CodeUnavailable,
    UnsupportedVersion,

    // Authorization errors
    MessageRejected,
    SeqnoMismatch,
    QueryIdRejected,

    // Transient errors
    NetworkError,
    RateLimited,
    Timeout,
    ProviderUnavailable,
    CircuitOpen,

    // Security errors
    AuthenticationFailed,
    WalletLocked,
    PasswordNotSet,

    // Capacity errors
    QueryIdExhausted,
    BatchTooLarge,
    EmptyBatch,

    // Storage errors
    StorageError,

    // Parse errors
    ParseError,
    JsonError,
    HexError,

    // Provider refused the request for a non-transient reason
    RequestRejected,

    // Internal
    Internal,
}

/// Coarse failure classes driving retry and surfacing decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Derivation,
    Authorization,
    Transient,
    Security,
    Capacity,
    Storage,
    Internal,
}

impl ErrorCode {
    pub fn category(self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            InvalidInput | InvalidAddress | InvalidMnemonic | InvalidPublicKey | CryptoError
            | CellOverflow | CellUnderflow | InvalidBoc | CodeUnavailable | UnsupportedVersion
            | ParseError | JsonError | HexError => ErrorCategory::Derivation,
            MessageRejected | SeqnoMismatch | QueryIdRejected | RequestRejected => {
                ErrorCategory::Authorization
            }
            NetworkError | RateLimited | Timeout | ProviderUnavailable | CircuitOpen => {
                ErrorCategory::Transient
            }
            AuthenticationFailed | WalletLocked | PasswordNotSet => ErrorCategory::Security,
            QueryIdExhausted | BatchTooLarge | EmptyBatch => ErrorCategory::Capacity,
            StorageError => ErrorCategory::Storage,
            Internal => ErrorCategory::Internal,
        }
    }
}

/// Result type alias for Hawala operations
pub type HawalaResult<T> = Result<T, HawalaError>;

// Conversions from common error types

impl From<serde_json::Error> for HawalaError {
    fn from(e: serde_json::Error) -> Self {
        HawalaError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for HawalaError {
    fn from(e: hex::FromHexError) -> Self {
        HawalaError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<base64::DecodeError> for HawalaError {
    fn from(e: base64::DecodeError) -> Self {
        HawalaError::new(ErrorCode::ParseError, format!("Invalid base64: {}", e))
    }
}

impl From<std::io::Error> for HawalaError {
    fn from(e: std::io::Error) -> Self {
        HawalaError::new(ErrorCode::StorageError, e.to_string())
    }
}

impl From<reqwest::Error> for HawalaError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HawalaError::new(ErrorCode::Timeout, "Request timed out")
        } else if e.is_connect() {
            HawalaError::new(ErrorCode::NetworkError, "Connection failed")
        } else if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                HawalaError::rate_limited("Provider rate limit exceeded")
            } else if status.is_server_error() {
                HawalaError::provider_unavailable(format!("Provider returned {}", status))
            } else {
                HawalaError::new(ErrorCode::RequestRejected, format!("Provider returned {}", status))
            }
        } else if e.is_decode() {
            HawalaError::parse_error(format!("Malformed provider response: {}", e))
        } else {
            HawalaError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for HawalaError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        HawalaError::timeout("Operation deadline exceeded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HawalaError::invalid_input("bad workchain").with_details("workchain=7");
        assert_eq!(err.to_string(), "[InvalidInput] bad workchain (workchain=7)");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(HawalaError::rate_limited("429").is_retryable());
        assert!(HawalaError::timeout("slow").is_retryable());
        assert!(HawalaError::provider_unavailable("502").is_retryable());
        assert!(!HawalaError::message_rejected("exit code 35").is_retryable());
        assert!(!HawalaError::auth_failed("wrong password").is_retryable());
        assert!(!HawalaError::query_id_exhausted("rotate").is_retryable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorCode::CellOverflow.category(), ErrorCategory::Derivation);
        assert_eq!(ErrorCode::SeqnoMismatch.category(), ErrorCategory::Authorization);
        assert_eq!(ErrorCode::WalletLocked.category(), ErrorCategory::Security);
        assert_eq!(ErrorCode::EmptyBatch.category(), ErrorCategory::Capacity);
        assert_eq!(ErrorCode::StorageError.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_error_serialization() {
        let err = HawalaError::auth_failed("decryption failed");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"authentication_failed\""));
        let back: HawalaError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
