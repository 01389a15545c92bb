//! Error types for the telemetry relay.
//!
//! Every fallible operation in the crate returns [`RelayError`]. The variants fall
//! into two groups that callers treat very differently:
//!
//! ## Fatal (startup) errors
//!
//! - **Schema validation**: duplicate or empty field names, invalid transforms
//! - **Bind**: a UDP or WebSocket listener could not be bound
//! - **Config**: an unreadable or malformed configuration / schema file
//!
//! These are raised before any packet is processed and should end the process
//! with a clear diagnostic.
//!
//! ## Recoverable (runtime) errors
//!
//! - **Buffer too short**: a single datagram cannot be decoded; it is dropped
//! - **Io**: a receive or file operation failed
//! - **Transport / Timeout**: one subscriber's connection failed; only that
//!   subscriber is affected
//!
//! ```rust
//! use telemetry_relay::RelayError;
//!
//! let error = RelayError::buffer_too_short(323, 12);
//! assert!(!error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Main error type for relay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Schema validation failed: {reason}")]
    SchemaValidation { reason: String },

    #[error("Packet too short: {required} bytes required, {actual} received")]
    BufferTooShort { required: usize, actual: usize },

    #[error("Failed to bind {role} listener on {addr}")]
    Bind {
        role: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl RelayError {
    /// Returns whether this error must stop the relay from starting.
    ///
    /// Runtime errors (one bad packet, one broken subscriber) are never fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            RelayError::SchemaValidation { .. } => true,
            RelayError::Bind { .. } => true,
            RelayError::Config { .. } => true,
            RelayError::BufferTooShort { .. } => false,
            RelayError::Io { .. } => false,
            RelayError::Transport { .. } => false,
            RelayError::Timeout { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RelayError::SchemaValidation { .. } => vec![
                "Check the field table for duplicate names",
                "Remove transforms from boolean fields",
                "Check field offsets fit in the address space",
            ],
            RelayError::BufferTooShort { .. } => vec![
                "Set the game's data out format to the Dash packet layout",
                "Check that the sender targets the right port",
                "Verify the schema matches the game's packet version",
            ],
            RelayError::Bind { .. } => vec![
                "Check whether another process already uses the port",
                "Choose a different port in the configuration",
                "Ports below 1024 may need elevated permissions",
            ],
            RelayError::Config { .. } => vec![
                "Check the configuration file path and YAML syntax",
                "Verify reader kind and transform names",
                "Check environment variable overrides",
            ],
            RelayError::Io { .. } => vec![
                "Check file permissions",
                "Verify the network interface is up",
            ],
            RelayError::Transport { .. } => vec![
                "Client disconnected or sent an invalid handshake",
                "Reconnect the dashboard client",
            ],
            RelayError::Timeout { .. } => vec![
                "Check client network conditions",
                "Increase the configured timeout",
            ],
        }
    }

    /// Helper constructor for schema validation errors.
    pub fn schema_validation(reason: impl Into<String>) -> Self {
        RelayError::SchemaValidation { reason: reason.into() }
    }

    /// Helper constructor for short-packet decode errors.
    pub fn buffer_too_short(required: usize, actual: usize) -> Self {
        RelayError::BufferTooShort { required, actual }
    }

    /// Helper constructor for listener bind failures.
    pub fn bind_failed(role: &'static str, addr: SocketAddr, source: std::io::Error) -> Self {
        RelayError::Bind { role, addr, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(context: impl Into<String>, details: impl Into<String>) -> Self {
        RelayError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for I/O errors with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RelayError::Io { context: context.into(), source }
    }

    /// Helper constructor for transport errors.
    pub fn transport(context: impl Into<String>) -> Self {
        RelayError::Transport { context: context.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        context: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RelayError::Transport { context: context.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Io { context: "<unknown>".to_string(), source: err }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RelayError::Transport { context: "WebSocket".to_string(), source: Some(Box::new(err)) }
    }
}
