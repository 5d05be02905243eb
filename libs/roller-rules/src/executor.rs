//! Rule Executor - compose a message from an ordered rule list
//!
//! Walks the rules with a program counter:
//! 1. Skips rules excluded by an earlier fired rule
//! 2. Parses and evaluates each condition against the rolled number
//! 3. Applies the fired rule's mode to the message buffer
//! 4. Follows stop / forward jump / mutual exclusion directives

use std::collections::HashSet;

use crate::error::{Result, RuleError};
use crate::parser::parse_condition;
use crate::types::{Condition, Keyword, MessageMode, RollBounds, Rule};

/// Why rule processing ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Cursor ran past the last rule
    Exhausted,
    /// A fired rule had `stop_on_trigger` set
    StopOnTrigger { rule: usize },
    /// A fired rule jumped past the end of the list
    InvalidJump { rule: usize, target: usize },
}

/// Result of running a rule list against one number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleExecutionResult {
    pub number: i64,
    /// Final composed message
    pub message: String,
    /// Rule indices whose condition was evaluated, in visiting order
    pub evaluated: Vec<usize>,
    /// Rule indices that fired, in visiting order
    pub fired: Vec<usize>,
    pub stop_reason: StopReason,
}

/// Evaluate a parsed condition against `number`
///
/// `roll_lowest`/`roll_highest` are the effective batch extrema used by the
/// keyword conditions.
pub fn evaluate_condition(
    condition: &Condition,
    number: i64,
    roll_lowest: i64,
    roll_highest: i64,
) -> bool {
    match condition {
        Condition::Compare { op, operand } => op.apply(number, *operand),
        Condition::Range { min, max } => *min <= number && number <= *max,
        Condition::Keyword(Keyword::Highest) => number == roll_highest,
        Condition::Keyword(Keyword::Lowest) => number == roll_lowest,
    }
}

/// Compose the message for `number`
///
/// Fails only when `number` lies outside the configured bounds; rules with
/// malformed or out-of-bounds conditions are skipped.
pub fn generate_message(
    number: i64,
    bounds: &RollBounds,
    default_message: &str,
    rules: &[Rule],
) -> Result<String> {
    execute_rules(number, bounds, default_message, rules).map(|result| result.message)
}

/// Run the rule list against `number` and report the execution trace
pub fn execute_rules(
    number: i64,
    bounds: &RollBounds,
    default_message: &str,
    rules: &[Rule],
) -> Result<RuleExecutionResult> {
    if bounds.lowest > bounds.highest {
        return Err(RuleError::InvalidBounds {
            lowest: bounds.lowest,
            highest: bounds.highest,
        });
    }
    if !bounds.contains(number) {
        return Err(RuleError::OutOfBounds {
            number,
            lowest: bounds.lowest,
            highest: bounds.highest,
        });
    }

    let (roll_lowest, roll_highest) = bounds.effective_extrema();
    let mut buffer = MessageBuffer::new(default_message);
    let mut excluded: HashSet<usize> = HashSet::new();
    let mut evaluated = Vec::new();
    let mut fired = Vec::new();
    let mut stop_reason = StopReason::Exhausted;
    let mut i = 0;

    while i < rules.len() {
        if excluded.contains(&i) {
            tracing::trace!("Rule {}: excluded", i);
            i += 1;
            continue;
        }

        let rule = &rules[i];
        let condition = match parse_condition(&rule.condition, bounds.lowest, bounds.highest) {
            Ok(condition) => condition,
            Err(e) => {
                tracing::debug!("Rule {} skipped: {}", i, e);
                i += 1;
                continue;
            },
        };

        evaluated.push(i);
        if !evaluate_condition(&condition, number, roll_lowest, roll_highest) {
            i += 1;
            continue;
        }

        tracing::trace!("Rule {} fired: {} ({})", i, condition, rule.mode);
        fired.push(i);
        buffer.apply(rule.mode, &rule.message);

        if let Some(indices) = &rule.mutually_exclusive {
            excluded.extend(indices.iter().filter_map(|&j| forward_index(j, i)));
        }

        if rule.stop_on_trigger {
            stop_reason = StopReason::StopOnTrigger { rule: i };
            break;
        }

        if let Some(target) = rule.jump_to_rule.and_then(|j| forward_index(j, i)) {
            if target >= rules.len() {
                stop_reason = StopReason::InvalidJump { rule: i, target };
                break;
            }
            i = target;
            continue;
        }

        i += 1;
    }

    Ok(RuleExecutionResult {
        number,
        message: buffer.finish(),
        evaluated,
        fired,
        stop_reason,
    })
}

/// Index `j` as seen from rule `current`, if it points strictly forward
fn forward_index(j: i64, current: usize) -> Option<usize> {
    usize::try_from(j).ok().filter(|&j| j > current)
}

/// Ordered message fragments
struct MessageBuffer<'a> {
    default_message: &'a str,
    fragments: Vec<&'a str>,
}

impl<'a> MessageBuffer<'a> {
    fn new(default_message: &'a str) -> Self {
        let mut buffer = Self {
            default_message,
            fragments: Vec::new(),
        };
        buffer.seed_default();
        buffer
    }

    fn seed_default(&mut self) {
        if !self.default_message.is_empty() {
            self.fragments.push(self.default_message);
        }
    }

    fn apply(&mut self, mode: MessageMode, message: &'a str) {
        match mode {
            MessageMode::Add => self.fragments.push(message),
            MessageMode::ReplaceLast => match self.fragments.last_mut() {
                Some(last) => *last = message,
                None => self.fragments.push(message),
            },
            MessageMode::ReplaceExceptDefault => {
                self.fragments.clear();
                self.seed_default();
                self.fragments.push(message);
            },
            MessageMode::ReplaceAll => {
                self.fragments.clear();
                self.fragments.push(message);
            },
        }
    }

    fn finish(self) -> String {
        self.fragments
            .iter()
            .filter(|fragment| !fragment.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}
