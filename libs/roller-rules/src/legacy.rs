//! Legacy rule migration
//!
//! Older settings stored rules under `message.cond_messages` as 4-element
//! arrays: `[condition, message, replace, stop]`. This module rewrites them
//! into `message.rules` records.

use toml::{Table, Value};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{MessageMode, Rule, RuleCondition};

/// Settings key holding the retired 4-tuple rules
pub const LEGACY_RULES_KEY: &str = "cond_messages";
/// Settings key holding the current rule records
pub const RULES_KEY: &str = "rules";
/// Settings section both keys live in
pub const MESSAGE_SECTION: &str = "message";

/// Convert legacy `[condition, message, replace, stop]` records into rules
///
/// Condition mapping:
/// - integer `n` becomes `"=n"`
/// - `[min, max]` integer pair stays a range
/// - string passes through unchanged (validated when the rule is evaluated)
///
/// Records of any other shape are dropped.
pub fn migrate_legacy_rules(records: &[Value]) -> Vec<Rule> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let rule = migrate_legacy_record(record);
            if rule.is_none() {
                warn!("Dropping legacy rule {}: unsupported record {}", index, record);
            }
            rule
        })
        .collect()
}

fn migrate_legacy_record(record: &Value) -> Option<Rule> {
    let [condition, message, replace, stop] = record.as_array()?.as_slice() else {
        return None;
    };

    let condition = match condition {
        Value::Integer(n) => RuleCondition::Text(format!("={}", n)),
        Value::String(text) => RuleCondition::Text(text.clone()),
        Value::Array(pair) => match pair.as_slice() {
            [Value::Integer(min), Value::Integer(max)] => RuleCondition::Range(*min, *max),
            _ => return None,
        },
        _ => return None,
    };

    let mode = if replace.as_bool()? {
        MessageMode::ReplaceAll
    } else {
        MessageMode::Add
    };

    Some(
        Rule::new(condition, message.as_str()?)
            .with_mode(mode)
            .with_stop_on_trigger(stop.as_bool()?),
    )
}

/// Rewrite legacy rules in a settings document
///
/// Returns the (possibly updated) document and whether anything changed.
/// Documents without `message.cond_messages` come back untouched.
pub fn migrate_settings(mut settings: Table) -> Result<(Table, bool)> {
    let Some(Value::Table(message)) = settings.get_mut(MESSAGE_SECTION) else {
        return Ok((settings, false));
    };
    let Some(legacy) = message.remove(LEGACY_RULES_KEY) else {
        return Ok((settings, false));
    };

    let records = match legacy {
        Value::Array(records) => records,
        other => {
            warn!("Legacy rules are not a list ({}), dropping them", other.type_str());
            Vec::new()
        },
    };

    let rules = migrate_legacy_rules(&records);
    let values = rules
        .iter()
        .map(Value::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    info!(
        "Migrated {} of {} legacy rules",
        values.len(),
        records.len()
    );
    message.insert(RULES_KEY.to_string(), Value::Array(values));

    Ok((settings, true))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn records(source: &str) -> Vec<Value> {
        let table: Table = toml::from_str(source).unwrap();
        table["cond_messages"].as_array().unwrap().clone()
    }

    #[test]
    fn test_migrate_condition_shapes() {
        let rules = migrate_legacy_rules(&records(
            r#"
            cond_messages = [
                [7, "Lucky seven!", true, false],
                ["highest", "Top", false, true],
                [[1, 5], "Low band", false, false],
            ]
            "#,
        ));

        assert_eq!(rules.len(), 3);
        assert_eq!(
            rules[0],
            Rule::new("=7", "Lucky seven!").with_mode(MessageMode::ReplaceAll)
        );
        assert_eq!(
            rules[1],
            Rule::new("highest", "Top").with_stop_on_trigger(true)
        );
        assert_eq!(rules[2], Rule::new((1, 5), "Low band"));
        assert!(rules
            .iter()
            .all(|r| r.jump_to_rule.is_none() && r.mutually_exclusive.is_none()));
    }

    #[test]
    fn test_migrate_drops_unsupported_records() {
        let rules = migrate_legacy_rules(&records(
            r#"
            cond_messages = [
                [1.5, "Float", false, false],
                [[1, 2, 3], "Triple", false, false],
                [3, "Short", true],
                [4, 42, true, false],
                [5, "Flag", "yes", false],
                [6, "Kept", false, false],
            ]
            "#,
        ));

        assert_eq!(rules, vec![Rule::new("=6", "Kept")]);
    }

    #[test]
    fn test_migrate_settings_rewrites_message_section() {
        let settings: Table = toml::from_str(
            r#"
            [bot]
            token = "abc123"

            [message]
            default_message = "Rolled"
            cond_messages = [
                [1, "Ouch", true, true],
                [[90, 100], "Great", false, false],
            ]
            "#,
        )
        .unwrap();

        let (migrated, changed) = migrate_settings(settings).unwrap();
        assert!(changed);

        let message = migrated["message"].as_table().unwrap();
        assert!(!message.contains_key("cond_messages"));
        assert_eq!(message["default_message"].as_str(), Some("Rolled"));

        let rules = message["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 2);

        let first = rules[0].as_table().unwrap();
        assert_eq!(first["condition"].as_str(), Some("=1"));
        assert_eq!(first["message"].as_str(), Some("Ouch"));
        assert_eq!(first["mode"].as_str(), Some("replace_all"));
        assert_eq!(first["stop_on_trigger"].as_bool(), Some(true));
        assert!(!first.contains_key("jump_to_rule"));
        assert!(!first.contains_key("mutually_exclusive"));

        let second = rules[1].as_table().unwrap();
        assert_eq!(
            second["condition"],
            Value::Array(vec![Value::Integer(90), Value::Integer(100)])
        );
        assert_eq!(second["mode"].as_str(), Some("add"));
    }

    #[test]
    fn test_migrate_settings_without_legacy_key_is_noop() {
        let source = r#"
            [message]
            default_message = "Rolled"
            rules = [{ condition = "=5", message = "Five" }]
        "#;
        let settings: Table = toml::from_str(source).unwrap();

        let (migrated, changed) = migrate_settings(settings.clone()).unwrap();
        assert!(!changed);
        assert_eq!(migrated, settings);

        let empty = Table::new();
        let (migrated, changed) = migrate_settings(empty.clone()).unwrap();
        assert!(!changed);
        assert_eq!(migrated, empty);
    }
}
