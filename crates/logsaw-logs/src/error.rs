//! Error types for logsaw-logs

use thiserror::Error;

/// Contract violations raised by the buffer and the event container
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// A size or index argument outside its valid range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation that does not apply to the current storage mode
    #[error("illegal state: {0}")]
    IllegalState(String),
}

/// Errors raised while compiling a rule expression
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("unterminated quoted text")]
    UnterminatedQuote,

    #[error("unknown level '{0}'")]
    UnknownLevel(String),

    #[error("'{0}' is not a number")]
    InvalidNumber(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("unknown pattern syntax '{0}'")]
    UnknownSyntax(String),
}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;
