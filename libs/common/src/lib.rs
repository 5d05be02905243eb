//! Number Roller basic library
//!
//! Provides functions shared by the roll service and tools:
//! - settings file loading and validation
//! - hot reloading of the settings file
//! - logging setup
//! - graceful shutdown

pub mod hot_reload;
pub mod logging;
pub mod settings;
pub mod shutdown;

pub use hot_reload::{HotReloadingSettings, SettingsHandle, DEFAULT_POLL_INTERVAL};
pub use settings::{
    load_bot_settings, load_settings_table, BotSettings, MessageSettings, RollSettings, Settings,
    SettingsError, SettingsSnapshot, DEFAULT_SETTINGS_PATH,
};

// Re-export common dependencies
pub use tokio;
pub use tokio_util::sync::CancellationToken;
