//! Error handling for the SMS inbox engine
//!
//! Every fallible operation in this crate returns [`Result`], an alias over
//! [`InboxError`]. Errors from the underlying libraries convert automatically
//! through `thiserror`'s `#[from]`.
//!
//! ## Error Categories
//!
//! ### Permission Errors
//! The capability gate refused a read or a send. Surfaced to the view as a
//! persistent explanatory state rather than a transient failure.
//!
//! ### Data Quality Errors
//! A record could not be used (for example, it has no thread id). These are
//! record-scoped: the offending record is skipped and logged, the batch goes
//! on. They are never returned from an aggregation pass.
//!
//! ### Send Errors
//! - `SendValidation`: empty body or address, rejected before any external call
//! - `Transport`: the external transport refused the message; no retry
//!
//! ### Source Errors
//! The record source could not be read (`Source`, `Database`, `Io`, `Json`).
//!
//! Timestamp formatting never produces an error; see [`crate::format`].
//!
//! ```rust
//! use cosmic_sms_core::{InboxError, Result};
//!
//! fn validate(body: &str) -> Result<&str> {
//!     let body = body.trim();
//!     if body.is_empty() {
//!         return Err(InboxError::SendValidation("message body is empty".to_string()));
//!     }
//!     Ok(body)
//! }
//!
//! assert!(validate("  ").is_err());
//! ```

use thiserror::Error;

/// Result type for inbox operations
pub type Result<T> = std::result::Result<T, InboxError>;

/// Errors that can occur while reading, aggregating or sending messages
#[derive(Error, Debug)]
pub enum InboxError {
    /// Capability check failed ("may read message log" / "may send message")
    ///
    /// ```rust
    /// use cosmic_sms_core::InboxError;
    ///
    /// let error = InboxError::PermissionDenied("read messages".to_string());
    /// assert_eq!(error.to_string(), "Permission denied: read messages");
    /// ```
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A record is missing a required field
    #[error("Data quality error: {0}")]
    DataQuality(String),

    /// Outgoing message rejected before reaching the transport
    #[error("Invalid message: {0}")]
    SendValidation(String),

    /// The external transport failed to send the message
    #[error("Transport error: {0}")]
    Transport(String),

    /// The record source failed to answer a query
    #[error("Record source error: {0}")]
    Source(String),

    /// SQLite error from the local message log
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InboxError {
    /// Check if the operation may succeed when tried again later
    ///
    /// Nothing in this crate retries on its own; this is a hint for callers.
    ///
    /// ```rust
    /// use cosmic_sms_core::InboxError;
    ///
    /// assert!(InboxError::Transport("radio off".to_string()).is_recoverable());
    /// assert!(!InboxError::SendValidation("empty".to_string()).is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InboxError::Transport(_)
                | InboxError::Source(_)
                | InboxError::Database(_)
                | InboxError::Io(_)
        )
    }

    /// Check if the error cannot clear without user intervention
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            InboxError::PermissionDenied(_) | InboxError::SendValidation(_)
        )
    }

    /// Get a short message suitable for showing in a view
    ///
    /// ```rust
    /// use cosmic_sms_core::InboxError;
    ///
    /// let error = InboxError::Transport("no signal".to_string());
    /// assert_eq!(error.user_message(), "Failed to send");
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            InboxError::PermissionDenied(what) => {
                format!("SMS permission required to {}. Please grant permission.", what)
            }
            InboxError::DataQuality(msg) => format!("Skipped unreadable message: {}.", msg),
            InboxError::SendValidation(msg) => format!("Cannot send: {}.", msg),
            InboxError::Transport(_) => "Failed to send".to_string(),
            InboxError::Source(msg) => format!("Error loading messages: {}", msg),
            InboxError::Database(e) => format!("Error loading messages: {}", e),
            InboxError::Json(e) => format!("Data format error: {}.", e),
            InboxError::Io(e) => format!("I/O error: {}.", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = InboxError::SendValidation("message body is empty".to_string());
        assert_eq!(error.to_string(), "Invalid message: message body is empty");

        let error = InboxError::Transport("modem busy".to_string());
        assert_eq!(error.to_string(), "Transport error: modem busy");

        let error = InboxError::DataQuality("record 7 has no thread id".to_string());
        assert_eq!(
            error.to_string(),
            "Data quality error: record 7 has no thread id"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        use std::io::{Error, ErrorKind};

        let io_error = Error::new(ErrorKind::NotFound, "messages.db not found");
        let inbox_error: InboxError = io_error.into();

        assert!(matches!(inbox_error, InboxError::Io(_)));
        assert!(inbox_error.to_string().contains("messages.db not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>(r#"{"threadId"#).unwrap_err();
        let inbox_error: InboxError = json_error.into();

        assert!(matches!(inbox_error, InboxError::Json(_)));
    }

    #[test]
    fn test_error_classification() {
        let error = InboxError::PermissionDenied("send messages".to_string());
        assert!(!error.is_recoverable());
        assert!(error.requires_user_action());

        let error = InboxError::Transport("timeout".to_string());
        assert!(error.is_recoverable());
        assert!(!error.requires_user_action());

        let error = InboxError::DataQuality("missing thread id".to_string());
        assert!(!error.is_recoverable());
        assert!(!error.requires_user_action());
    }

    #[test]
    fn test_permission_user_message() {
        let error = InboxError::PermissionDenied("read messages".to_string());
        assert_eq!(
            error.user_message(),
            "SMS permission required to read messages. Please grant permission."
        );
    }
}
