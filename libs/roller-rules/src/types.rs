//! Rule type definitions
//!
//! Core types for rule loading and execution:
//! - Rule: one conditional directive as persisted in the settings file
//! - RuleCondition: the persisted (unparsed) condition, text or range pair
//! - MessageMode: how a fired rule mutates the message buffer
//! - Condition: the parsed, evaluable condition

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Persisted Rule Structure
// ============================================================================

/// Rule - one conditional message directive
///
/// Rules are evaluated in list order; `jump_to_rule` and `mutually_exclusive`
/// refer to 0-based positions in that same list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Condition, parsed on every evaluation
    pub condition: RuleCondition,

    /// Fragment contributed when the rule fires
    pub message: String,

    /// Buffer mutation strategy
    #[serde(default)]
    pub mode: MessageMode,

    /// Halt processing once this rule fires
    #[serde(default)]
    pub stop_on_trigger: bool,

    /// Forward jump target, inert unless greater than this rule's index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_to_rule: Option<i64>,

    /// Later rules suppressed once this rule fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutually_exclusive: Option<Vec<i64>>,
}

impl Rule {
    /// Create an `add` rule with no control flow
    pub fn new(condition: impl Into<RuleCondition>, message: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            message: message.into(),
            mode: MessageMode::Add,
            stop_on_trigger: false,
            jump_to_rule: None,
            mutually_exclusive: None,
        }
    }

    pub fn with_mode(mut self, mode: MessageMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stop_on_trigger(mut self, stop: bool) -> Self {
        self.stop_on_trigger = stop;
        self
    }

    pub fn with_jump_to(mut self, target: i64) -> Self {
        self.jump_to_rule = Some(target);
        self
    }

    pub fn with_mutually_exclusive(mut self, indices: impl IntoIterator<Item = i64>) -> Self {
        self.mutually_exclusive = Some(indices.into_iter().collect());
        self
    }
}

/// Persisted condition: either text (`"=7"`, `"10-20"`, `"highest"`) or an
/// inclusive range pair written as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleCondition {
    Range(i64, i64),
    Text(String),
}

impl From<&str> for RuleCondition {
    fn from(value: &str) -> Self {
        RuleCondition::Text(value.to_string())
    }
}

impl From<String> for RuleCondition {
    fn from(value: String) -> Self {
        RuleCondition::Text(value)
    }
}

impl From<(i64, i64)> for RuleCondition {
    fn from((min, max): (i64, i64)) -> Self {
        RuleCondition::Range(min, max)
    }
}

impl fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCondition::Range(min, max) => write!(f, "[{}, {}]", min, max),
            RuleCondition::Text(text) => f.write_str(text),
        }
    }
}

/// Message buffer mutation applied when a rule fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageMode {
    /// Append the fragment
    #[default]
    Add,
    /// Replace the most recent fragment (append when the buffer is empty)
    ReplaceLast,
    /// Reset the buffer to the default message plus this fragment
    ReplaceExceptDefault,
    /// Reset the buffer to this fragment alone
    ReplaceAll,
}

impl MessageMode {
    pub const ALL: [MessageMode; 4] = [
        MessageMode::Add,
        MessageMode::ReplaceLast,
        MessageMode::ReplaceExceptDefault,
        MessageMode::ReplaceAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageMode::Add => "add",
            MessageMode::ReplaceLast => "replace_last",
            MessageMode::ReplaceExceptDefault => "replace_except_default",
            MessageMode::ReplaceAll => "replace_all",
        }
    }

    /// Look up a mode by its persisted name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == name)
    }
}

impl fmt::Display for MessageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parsed Condition Structures
// ============================================================================

/// Comparison operator: "=", "!=", ">", ">=", "<", "<="
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    pub fn apply(&self, left: i64, right: i64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Gt => left > right,
            CompareOp::Gte => left >= right,
            CompareOp::Lt => left < right,
            CompareOp::Lte => left <= right,
        }
    }
}

/// Batch-relative keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Highest,
    Lowest,
}

/// Parsed condition, validated against the allowed bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Compare { op: CompareOp, operand: i64 },
    /// Inclusive; a descending range never matches
    Range { min: i64, max: i64 },
    Keyword(Keyword),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            Condition::Range { min, max } => write!(f, "{}-{}", min, max),
            Condition::Keyword(Keyword::Highest) => f.write_str("highest"),
            Condition::Keyword(Keyword::Lowest) => f.write_str("lowest"),
        }
    }
}

// ============================================================================
// Evaluation Context
// ============================================================================

/// Bounds for one evaluation
///
/// `lowest`/`highest` are the configured limits every number and condition
/// operand must respect. `roll_lowest`/`roll_highest` are the realized extrema
/// of the current batch, used by the `highest`/`lowest` keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollBounds {
    pub lowest: i64,
    pub highest: i64,
    pub roll_lowest: Option<i64>,
    pub roll_highest: Option<i64>,
}

impl RollBounds {
    pub fn new(lowest: i64, highest: i64) -> Self {
        Self {
            lowest,
            highest,
            roll_lowest: None,
            roll_highest: None,
        }
    }

    pub fn with_roll_extrema(mut self, roll_lowest: i64, roll_highest: i64) -> Self {
        self.roll_lowest = Some(roll_lowest);
        self.roll_highest = Some(roll_highest);
        self
    }

    pub fn contains(&self, number: i64) -> bool {
        (self.lowest..=self.highest).contains(&number)
    }

    /// Batch extrema, defaulted to the allowed bounds and clamped into them
    pub fn effective_extrema(&self) -> (i64, i64) {
        let clamp = |value: i64| value.max(self.lowest).min(self.highest);
        let low = clamp(self.roll_lowest.unwrap_or(self.lowest));
        let high = clamp(self.roll_highest.unwrap_or(self.highest));
        (low, high)
    }
}
