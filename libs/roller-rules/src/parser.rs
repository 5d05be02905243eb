//! Condition Parser
//!
//! Turns a persisted `RuleCondition` into an evaluable `Condition`,
//! validating operands against the configured bounds.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Result, RuleError};
use crate::types::{CompareOp, Condition, Keyword, RuleCondition};

static RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)-(\d+)$").expect("range pattern is valid"));

static COMPARISON_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([><=!]+)(-?\d+)$").expect("comparison pattern is valid"));

/// Parse a condition within `[lowest, highest]`
///
/// Accepted forms:
/// - `highest` / `lowest` (any case)
/// - `min-max` inclusive range, or a `[min, max]` pair
/// - `<op><int>` with op one of `=`, `!=`, `>`, `>=`, `<`, `<=`
pub fn parse_condition(condition: &RuleCondition, lowest: i64, highest: i64) -> Result<Condition> {
    match condition {
        RuleCondition::Range(min, max) => range_within(*min, *max, condition, lowest, highest),
        RuleCondition::Text(text) => parse_condition_text(text, lowest, highest),
    }
}

fn parse_condition_text(text: &str, lowest: i64, highest: i64) -> Result<Condition> {
    if text.eq_ignore_ascii_case("highest") {
        return Ok(Condition::Keyword(Keyword::Highest));
    }
    if text.eq_ignore_ascii_case("lowest") {
        return Ok(Condition::Keyword(Keyword::Lowest));
    }

    if let Some(caps) = RANGE_PATTERN.captures(text) {
        let min = parse_int(&caps[1], text)?;
        let max = parse_int(&caps[2], text)?;
        let condition = RuleCondition::Text(text.to_string());
        return range_within(min, max, &condition, lowest, highest);
    }

    if let Some(caps) = COMPARISON_PATTERN.captures(text) {
        let op = CompareOp::from_symbol(&caps[1])
            .ok_or_else(|| RuleError::InvalidCondition(text.to_string()))?;
        let operand = parse_int(&caps[2], text)?;
        if operand < lowest || operand > highest {
            return Err(RuleError::ConditionBounds {
                condition: text.to_string(),
                lowest,
                highest,
            });
        }
        return Ok(Condition::Compare { op, operand });
    }

    Err(RuleError::InvalidCondition(text.to_string()))
}

fn range_within(
    min: i64,
    max: i64,
    condition: &RuleCondition,
    lowest: i64,
    highest: i64,
) -> Result<Condition> {
    if min < lowest || max > highest {
        return Err(RuleError::ConditionBounds {
            condition: condition.to_string(),
            lowest,
            highest,
        });
    }
    Ok(Condition::Range { min, max })
}

fn parse_int(digits: &str, text: &str) -> Result<i64> {
    digits
        .parse::<i64>()
        .map_err(|_| RuleError::InvalidCondition(text.to_string()))
}
