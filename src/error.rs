//! Error types for massreply.

use std::path::PathBuf;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// Configuration-related errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load skip list {path}: {message}")]
    SkipList { path: PathBuf, message: String },

    #[error("Invalid {which} template: {source}")]
    Template {
        which: String,
        #[source]
        source: TemplateError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// IMAP/SMTP failures. Fatal to the whole run; report lines collected
/// before the failure are preserved by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {server}: {message}")]
    Connect { server: String, message: String },

    #[error("TLS setup failed for {server}: {message}")]
    Tls { server: String, message: String },

    #[error("Authentication failed for {user}: {message}")]
    Auth { user: String, message: String },

    #[error("Protocol error during {command}: {message}")]
    Protocol { command: String, message: String },

    #[error("Invalid address {address}: {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Send to {recipient} failed: {message}")]
    Send { recipient: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Template substitution errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown placeholder {{{name}}}")]
    UnknownPlaceholder { name: String },

    #[error("Unbalanced brace at byte {position}")]
    UnbalancedBrace { position: usize },
}

/// Why a single message's reply could not be assembled. Fatal for that
/// message only; the run continues without a report line for it.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("template substitution failed: {0}")]
    Template(#[from] TemplateError),

    #[error("invalid recipient address {address}: {message}")]
    Recipient { address: String, message: String },

    #[error("invalid {field} address {address}: {message}")]
    HeaderAddress {
        field: &'static str,
        address: String,
        message: String,
    },

    #[error("failed to build MIME message: {0}")]
    Build(#[from] lettre::error::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
