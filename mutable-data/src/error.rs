//! Error types and result definitions for data and definition operations.

use thiserror::Error;

/// Errors raised by definitions and data trees.
///
/// Every error is fatal to the call that raised it; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// The schema itself is malformed, or a default could not be computed.
    ///
    /// This always indicates a programming or schema bug.
    #[error("invalid definition: {0}")]
    Definition(String),

    /// A value or structure violates a node's type or cardinality contract.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A nonexistent property, delta or node was referenced.
    #[error("invalid access: {0}")]
    InvalidAccess(String),

    /// An address could not be resolved.
    #[error("invalid data address: {0}")]
    InvalidAddress(String),
}

impl DataError {
    /// Creates a definition error.
    pub fn definition(msg: impl Into<String>) -> Self {
        DataError::Definition(msg.into())
    }

    /// Creates an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        DataError::InvalidInput(msg.into())
    }

    /// Creates an invalid access error.
    pub fn invalid_access(msg: impl Into<String>) -> Self {
        DataError::InvalidAccess(msg.into())
    }

    /// Creates an invalid address error.
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        DataError::InvalidAddress(msg.into())
    }

    pub fn is_definition(&self) -> bool {
        matches!(self, DataError::Definition(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, DataError::InvalidInput(_))
    }

    pub fn is_invalid_access(&self) -> bool {
        matches!(self, DataError::InvalidAccess(_))
    }

    pub fn is_invalid_address(&self) -> bool {
        matches!(self, DataError::InvalidAddress(_))
    }

    /// Returns the message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            DataError::Definition(msg)
            | DataError::InvalidInput(msg)
            | DataError::InvalidAccess(msg)
            | DataError::InvalidAddress(msg) => msg,
        }
    }
}

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;
