//! Error types for datapipes.

use thiserror::Error;

/// The main error type for datapipes operations.
#[derive(Debug, Error)]
pub enum PipeError {
    /// A verb's generic fallback ran: nothing is registered for the input's type.
    #[error("{verb} is not implemented for data of type {type_name}")]
    UnsupportedInputType {
        verb: String,
        type_name: String,
    },

    /// The chaining operator was used with operands it does not accept.
    #[error("Invalid pipe usage: {0}")]
    InvalidPipeUsage(String),

    /// No verb with this name is declared in the registry.
    #[error("Unknown verb: '{0}'")]
    UnknownVerb(String),

    /// A captured argument could not be bound to what the verb expects.
    #[error("Invalid argument for {verb}: {message}")]
    InvalidArgument { verb: String, message: String },

    /// Failed to parse a chain expression.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input or output error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure raised by a verb implementation, passed through as-is.
    #[error(transparent)]
    Verb(#[from] anyhow::Error),
}

impl PipeError {
    /// Create an unsupported input type error.
    pub fn unsupported(verb: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedInputType {
            verb: verb.into(),
            type_name: type_name.into(),
        }
    }

    /// Create an invalid pipe usage error.
    pub fn invalid_usage(message: impl Into<String>) -> Self {
        Self::InvalidPipeUsage(message.into())
    }

    /// Create an invalid argument error.
    pub fn argument(verb: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            verb: verb.into(),
            message: message.into(),
        }
    }

    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias for datapipes operations.
pub type PipeResult<T> = Result<T, PipeError>;
