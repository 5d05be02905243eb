//! Bot settings loading
//!
//! Settings live in a TOML file (default `bot_settings.toml`) and can be
//! overridden by `ROLLER_`-prefixed environment variables, using `__` as the
//! section separator (e.g. `ROLLER_BOT__TOKEN`).

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use roller_rules::{load_rules_from_settings, Rule};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Table;

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_PATH: &str = "bot_settings.toml";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "ROLLER_";

/// `ROLLER_` variables read by the binaries themselves, never settings keys
const RESERVED_ENV_KEYS: [&str; 2] = ["settings", "log_dir"];

/// Result type for settings operations
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Settings loading errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File missing, unreadable or not valid TOML
    #[error("Failed to load settings from {path}: {message}")]
    Load { path: PathBuf, message: String },

    /// Document parsed but does not have the expected shape
    #[error("Invalid settings: {0}")]
    Invalid(String),

    /// Rule section rejected by the rule loader
    #[error("Invalid message rules: {0}")]
    Rules(#[from] roller_rules::RuleError),
}

/// Complete settings document
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    pub bot: BotSettings,
    #[serde(default)]
    pub roll: RollSettings,
    #[serde(default)]
    pub message: MessageSettings,
}

/// `[bot]` section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BotSettings {
    /// Gateway token
    #[serde(default, deserialize_with = "deserialize_string_flexible")]
    pub token: String,
    /// Channel the roll results are posted to
    pub channel: u64,
    /// One roll per user id, in this order
    #[serde(default)]
    pub users: Vec<u64>,
    /// Cron expression (5-field minute-first, or 6/7-field seconds-first)
    pub cron: String,
    /// IANA timezone the cron expression is evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// `[roll]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RollSettings {
    #[serde(default = "default_min_number")]
    pub min_number: i64,
    #[serde(default = "default_max_number")]
    pub max_number: i64,
}

fn default_min_number() -> i64 {
    1
}

fn default_max_number() -> i64 {
    1000
}

impl Default for RollSettings {
    fn default() -> Self {
        Self {
            min_number: default_min_number(),
            max_number: default_max_number(),
        }
    }
}

/// `[message]` section (rules are read separately through the rule loader)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MessageSettings {
    #[serde(default, deserialize_with = "deserialize_string_flexible")]
    pub default_message: String,
    /// Template with a literal `{number}` placeholder
    #[serde(
        default = "default_number_message",
        deserialize_with = "deserialize_string_flexible"
    )]
    pub number_message: String,
}

fn default_number_message() -> String {
    "{number}".to_string()
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            default_message: String::new(),
            number_message: default_number_message(),
        }
    }
}

impl MessageSettings {
    /// Substitute the rolled number into the template
    pub fn render_number(&self, number: i64) -> String {
        self.number_message.replace("{number}", &number.to_string())
    }
}

/// String field that also accepts numbers and booleans
///
/// Environment overrides are typed by figment, so `ROLLER_BOT__TOKEN=12345`
/// arrives as an integer.
fn deserialize_string_flexible<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrScalar {
        String(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match StringOrScalar::deserialize(deserializer)? {
        StringOrScalar::String(s) => s,
        StringOrScalar::Int(i) => i.to_string(),
        StringOrScalar::Float(f) => f.to_string(),
        StringOrScalar::Bool(b) => b.to_string(),
    })
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.roll.min_number > self.roll.max_number {
            return Err(SettingsError::Invalid(format!(
                "roll.min_number ({}) is greater than roll.max_number ({})",
                self.roll.min_number, self.roll.max_number
            )));
        }
        if self.bot.cron.trim().is_empty() {
            return Err(SettingsError::Invalid("bot.cron is empty".to_string()));
        }
        Ok(())
    }
}

/// Immutable view of one successfully loaded settings file
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    pub settings: Settings,
    /// Rules in file order
    pub rules: Vec<Rule>,
    /// Raw document as read (after environment overrides)
    pub raw: Table,
}

impl SettingsSnapshot {
    /// Build a snapshot from an already parsed document
    pub fn from_table(raw: Table) -> Result<Self> {
        let settings: Settings = toml::Value::Table(raw.clone())
            .try_into()
            .map_err(|e: toml::de::Error| SettingsError::Invalid(e.message().to_string()))?;
        settings.validate()?;
        let rules = load_rules_from_settings(&raw)?;

        Ok(Self {
            settings,
            rules,
            raw,
        })
    }
}

/// Read the raw settings document, with environment overrides applied
pub fn load_settings_table(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SettingsError::Load {
            path: path.to_path_buf(),
            message: "file not found".to_string(),
        });
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&RESERVED_ENV_KEYS)
                .split("__"),
        )
        .extract::<Table>()
        .map_err(|e| SettingsError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Load, validate and snapshot the settings file at `path`
pub fn load_bot_settings(path: impl AsRef<Path>) -> Result<SettingsSnapshot> {
    let raw = load_settings_table(path)?;
    SettingsSnapshot::from_table(raw)
}
