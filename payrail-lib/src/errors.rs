//! Error types for payrail operations.
//!
//! Every layer below the router downgrades these errors into optional or
//! boolean results so the fallback chain can always proceed. The only failure
//! surfaced to callers of [`crate::routing::PaymentRouter`] is a terminal
//! [`crate::routing::PaymentResult`] with method `failed`.

use std::fmt;

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PayrailErrorCode {
    /// Transport/network layer error
    Transport = 2000,
    /// Connection failed
    ConnectionFailed = 2001,
    /// Connection timeout
    ConnectionTimeout = 2002,
    /// Non-success HTTP status
    HttpStatus = 2003,
    /// Capability not configured
    Unsupported = 4001,
    /// Invalid request/data
    InvalidData = 5000,
    /// Validation failed
    ValidationFailed = 5001,
    /// Serialization error
    Serialization = 5002,
    /// Cryptographic failure (decrypt, verify, key parsing)
    Crypto = 5500,
    /// Payment-specific errors
    Payment = 6000,
    /// No relay accepted an event
    DeliveryFailed = 6500,
    /// Every rail failed
    Exhausted = 6900,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for payrail operations.
#[derive(Debug)]
pub enum PayrailError {
    /// Transport/network layer error.
    Transport(String),

    /// Connection failed.
    ConnectionFailed {
        /// Target endpoint or service
        target: String,
        /// Underlying error message
        reason: String,
    },

    /// Connection timeout.
    ConnectionTimeout {
        /// Operation that timed out
        operation: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Remote answered with a non-success status.
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },

    /// A capability the operation needs was not injected.
    Unsupported(&'static str),

    /// Invalid data provided.
    InvalidData {
        /// Field or parameter name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Validation failed.
    ValidationFailed(String),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Decryption, signature verification or key parsing failed.
    Crypto(String),

    /// Payment operation failed.
    Payment {
        /// Rail that attempted the payment
        rail: String,
        /// Failure reason
        reason: String,
    },

    /// No relay accepted a published event.
    DeliveryFailed {
        /// Number of relays attempted
        attempted: usize,
        /// Last rejection reason, if any
        reason: String,
    },

    /// All rails failed for a recipient.
    Exhausted(String),

    /// Internal/unexpected error.
    Internal(String),
}

impl PayrailError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> PayrailErrorCode {
        match self {
            Self::Transport(_) => PayrailErrorCode::Transport,
            Self::ConnectionFailed { .. } => PayrailErrorCode::ConnectionFailed,
            Self::ConnectionTimeout { .. } => PayrailErrorCode::ConnectionTimeout,
            Self::HttpStatus { .. } => PayrailErrorCode::HttpStatus,
            Self::Unsupported(_) => PayrailErrorCode::Unsupported,
            Self::InvalidData { .. } => PayrailErrorCode::InvalidData,
            Self::ValidationFailed(_) => PayrailErrorCode::ValidationFailed,
            Self::Serialization(_) => PayrailErrorCode::Serialization,
            Self::Crypto(_) => PayrailErrorCode::Crypto,
            Self::Payment { .. } => PayrailErrorCode::Payment,
            Self::DeliveryFailed { .. } => PayrailErrorCode::DeliveryFailed,
            Self::Exhausted(_) => PayrailErrorCode::Exhausted,
            Self::Internal(_) => PayrailErrorCode::Internal,
        }
    }

    /// Returns true for network-class failures that a later attempt may clear.
    ///
    /// The router itself never retries within a call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ConnectionFailed { .. }
                | Self::ConnectionTimeout { .. }
                | Self::DeliveryFailed { .. }
        ) || matches!(self, Self::HttpStatus { status, .. } if *status >= 500 || *status == 429)
    }

    /// Create an invalid data error.
    pub fn invalid_data(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a payment error for the given rail.
    pub fn payment(rail: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Payment {
            rail: rail.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PayrailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::ConnectionFailed { target, reason } => {
                write!(f, "connection to {} failed: {}", target, reason)
            }
            Self::ConnectionTimeout {
                operation,
                timeout_ms,
            } => {
                write!(f, "{} timed out after {}ms", operation, timeout_ms)
            }
            Self::HttpStatus { status, url } => {
                write!(f, "request to {} returned status {}", url, status)
            }
            Self::Unsupported(capability) => {
                write!(f, "{} is not configured", capability)
            }
            Self::InvalidData { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::Crypto(msg) => write!(f, "cryptographic error: {}", msg),
            Self::Payment { rail, reason } => {
                write!(f, "{} payment failed: {}", rail, reason)
            }
            Self::DeliveryFailed { attempted, reason } => {
                write!(
                    f,
                    "no relay accepted the event ({} attempted): {}",
                    attempted, reason
                )
            }
            Self::Exhausted(msg) => write!(f, "all payment rails failed: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for PayrailError {}

impl From<serde_json::Error> for PayrailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<secp256k1::Error> for PayrailError {
    fn from(err: secp256k1::Error) -> Self {
        Self::Crypto(err.to_string())
    }
}
