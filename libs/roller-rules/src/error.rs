//! Rule Engine Error Types

use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Rule engine errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// Rolled number lies outside the configured bounds
    #[error("Number {number} is outside bounds [{lowest}, {highest}]")]
    OutOfBounds {
        number: i64,
        lowest: i64,
        highest: i64,
    },

    /// Configured bounds are inverted
    #[error("Invalid bounds: lowest {lowest} is greater than highest {highest}")]
    InvalidBounds { lowest: i64, highest: i64 },

    /// Condition operand or range lies outside the configured bounds
    #[error("Condition '{condition}' is outside bounds [{lowest}, {highest}]")]
    ConditionBounds {
        condition: String,
        lowest: i64,
        highest: i64,
    },

    /// Condition text matches no known form
    #[error("Invalid condition: '{0}'")]
    InvalidCondition(String),

    /// Unknown message mode in a rule definition
    #[error("Invalid message mode '{mode}' in rule {index}")]
    InvalidMode { index: usize, mode: String },

    /// Settings still use the retired `cond_messages` format
    #[error(
        "Legacy message rules (message.cond_messages) are no longer supported; \
         run `roll-migrate <settings_file>` to migrate them first"
    )]
    LegacyFormat,

    /// Rule could not be converted to or from its persisted form
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<toml::ser::Error> for RuleError {
    fn from(err: toml::ser::Error) -> Self {
        RuleError::SerializationError(err.to_string())
    }
}
