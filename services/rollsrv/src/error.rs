use thiserror::Error;

pub type Result<T> = std::result::Result<T, RollSrvError>;

#[derive(Error, Debug)]
pub enum RollSrvError {
    #[error("Settings error: {0}")]
    Settings(#[from] common::SettingsError),

    #[error("Rule error: {0}")]
    Rules(#[from] roller_rules::RuleError),

    #[error("Invalid schedule '{expression}': {message}")]
    Schedule { expression: String, message: String },

    #[error("Unknown timezone '{0}'")]
    Timezone(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl RollSrvError {
    pub fn schedule(expression: impl Into<String>, message: impl ToString) -> Self {
        Self::Schedule {
            expression: expression.into(),
            message: message.to_string(),
        }
    }

    pub fn delivery(message: impl ToString) -> Self {
        Self::Delivery(message.to_string())
    }
}
