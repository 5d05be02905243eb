//! Rule loading from a parsed settings document
//!
//! Reads `message.rules` into `Rule` records. Malformed entries are skipped
//! individually; unknown modes and the retired `cond_messages` format fail
//! the whole load.

use serde::Deserialize;
use toml::{Table, Value};
use tracing::warn;

use crate::error::{Result, RuleError};
use crate::legacy::{LEGACY_RULES_KEY, MESSAGE_SECTION, RULES_KEY};
use crate::types::{MessageMode, Rule};

/// Load the ordered rule list from a whole settings document
pub fn load_rules_from_settings(settings: &Table) -> Result<Vec<Rule>> {
    match settings.get(MESSAGE_SECTION) {
        Some(Value::Table(message)) => load_rules(message),
        Some(other) => {
            warn!(
                "Settings section '{}' is a {}, expected a table; no rules loaded",
                MESSAGE_SECTION,
                other.type_str()
            );
            Ok(Vec::new())
        },
        None => Ok(Vec::new()),
    }
}

/// Load the ordered rule list from the `[message]` section
pub fn load_rules(message: &Table) -> Result<Vec<Rule>> {
    if message.contains_key(LEGACY_RULES_KEY) {
        return Err(RuleError::LegacyFormat);
    }

    let entries = match message.get(RULES_KEY) {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            warn!(
                "'{}' is a {}, expected a list; no rules loaded",
                RULES_KEY,
                other.type_str()
            );
            return Ok(Vec::new());
        },
        None => return Ok(Vec::new()),
    };

    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Value::Table(fields) = entry else {
            warn!("Skipping rule {}: expected a table, got {}", index, entry.type_str());
            continue;
        };

        if let Some(Value::String(mode)) = fields.get("mode") {
            if MessageMode::from_name(mode).is_none() {
                return Err(RuleError::InvalidMode {
                    index,
                    mode: mode.clone(),
                });
            }
        }

        match Rule::deserialize(entry.clone()) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!("Skipping rule {}: {}", index, e),
        }
    }

    Ok(rules)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::RuleCondition;
    use tracing_test::traced_test;

    fn settings(source: &str) -> Table {
        toml::from_str(source).unwrap()
    }

    #[test]
    fn test_loads_new_format_rules() {
        let rules = load_rules_from_settings(&settings(
            r#"
            [[message.rules]]
            condition = "=50"
            message = "Half way"
            mode = "add"
            stop_on_trigger = false

            [[message.rules]]
            condition = ">=90"
            message = "High roll"
            mode = "replace_all"
            stop_on_trigger = true
            jump_to_rule = 3
            mutually_exclusive = [2]
            "#,
        ))
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].condition, RuleCondition::from("=50"));
        assert_eq!(rules[0].mode, MessageMode::Add);
        assert_eq!(rules[0].jump_to_rule, None);
        assert_eq!(rules[1].condition, RuleCondition::from(">=90"));
        assert_eq!(rules[1].mode, MessageMode::ReplaceAll);
        assert!(rules[1].stop_on_trigger);
        assert_eq!(rules[1].jump_to_rule, Some(3));
        assert_eq!(rules[1].mutually_exclusive, Some(vec![2]));
    }

    #[test]
    fn test_returns_empty_without_message_section() {
        let rules = load_rules_from_settings(&settings(
            r#"
            [bot]
            token = "abc123"
            "#,
        ))
        .unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_returns_empty_when_rules_missing() {
        let rules = load_rules_from_settings(&settings("[message]")).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_list_conditions_become_ranges() {
        let rules = load_rules_from_settings(&settings(
            r#"
            [[message.rules]]
            condition = [1, 5]
            message = "Between one and five"
            mode = "replace_all"
            "#,
        ))
        .unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].condition, RuleCondition::Range(1, 5));
        assert_eq!(rules[0].mode, MessageMode::ReplaceAll);
    }

    #[traced_test]
    #[test]
    fn test_invalid_rule_entries_are_skipped() {
        let rules = load_rules_from_settings(&settings(
            r#"
            [message]
            rules = [
                { condition = "=10" },
                "totally invalid",
                { condition = [1, 2, 3], message = "Triple" },
                { condition = "=15", message = "Bad flag", stop_on_trigger = "yes" },
                { condition = "=20", message = "Valid" },
            ]
            "#,
        ))
        .unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].message, "Valid");
        assert!(logs_contain("Skipping rule 0"));
        assert!(logs_contain("Skipping rule 1: expected a table"));
        assert!(logs_contain("Skipping rule 3"));
    }

    #[test]
    fn test_cond_messages_key_raises() {
        let err = load_rules_from_settings(&settings(
            r#"
            [message]
            cond_messages = [[1, "Legacy", true, true]]
            "#,
        ))
        .unwrap_err();

        assert_eq!(err, RuleError::LegacyFormat);
        assert!(err.to_string().contains("Legacy message rules"));
    }

    #[test]
    fn test_unknown_mode_fails_load() {
        let err = load_rules_from_settings(&settings(
            r#"
            [[message.rules]]
            condition = "=10"
            message = "Fine"

            [[message.rules]]
            condition = "=20"
            message = "Broken"
            mode = "replace_first"
            "#,
        ))
        .unwrap_err();

        assert_eq!(
            err,
            RuleError::InvalidMode {
                index: 1,
                mode: "replace_first".to_string()
            }
        );
    }
}
