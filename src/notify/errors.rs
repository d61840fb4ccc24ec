//! Notification error types.

use thiserror::Error;

/// Notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A recipient or sender address could not be parsed
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The outbound message could not be assembled
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    /// SMTP transport failure
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Result type for notification operations
pub type NotifyResult<T> = Result<T, NotifyError>;
