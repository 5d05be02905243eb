//! Roller Rules - Message Rule Engine Library
//!
//! Composes the message attached to a rolled number from an ordered list of
//! conditional rules:
//! - Condition parsing (`=7`, `>=90`, `10-20`, `[10, 20]`, `highest`, `lowest`)
//! - Sequential rule execution with message modes, stop, forward jumps and
//!   mutual exclusion
//! - Rule loading from the settings document
//! - One-shot migration of the retired `cond_messages` format
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │   Loader    │────▶│   Executor   │────▶│   message   │
//! │ (settings)  │     │ (pc + buffer)│     │  (String)   │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐
//!                     │    Parser    │
//!                     │ (per rule)   │
//!                     └──────────────┘
//! ```

mod error;
mod executor;
mod legacy;
mod loader;
mod parser;
pub mod types;

// Re-export public API
pub use error::{Result, RuleError};
pub use executor::{
    evaluate_condition, execute_rules, generate_message, RuleExecutionResult, StopReason,
};
pub use legacy::{
    migrate_legacy_rules, migrate_settings, LEGACY_RULES_KEY, MESSAGE_SECTION, RULES_KEY,
};
pub use loader::{load_rules, load_rules_from_settings};
pub use parser::parse_condition;

// Re-export rule types for convenience
pub use types::{
    CompareOp, Condition, Keyword, MessageMode, RollBounds, Rule, RuleCondition,
};
