//! Logging setup for Number Roller services
//!
//! Console output uses a compact `timestamp [LEVEL] message` format. When a
//! log directory is configured, the same format is also written to a
//! daily-rolling file named `{service}.log.YYYY-MM-DD`.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        self,
        format::{FormatEvent, FormatFields, Writer},
        FmtContext,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Roll job scheduled`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the non-blocking file writer flushing until process exit
static FILE_GUARD: OnceLock<Mutex<Option<WorkerGuard>>> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as the default filter target and file prefix
    pub service_name: String,
    /// Directory for daily log files; console only when `None`
    pub log_dir: Option<PathBuf>,
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
    /// Colored console output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "rollsrv".to_string(),
            log_dir: None,
            level: Level::INFO,
            ansi: true,
        }
    }
}

/// Filter used when `RUST_LOG` is not set
fn default_filter(config: &LogConfig) -> String {
    let level = config.level.as_str().to_lowercase();
    format!(
        "warn,{}={},common={},roller_rules={}",
        config.service_name.replace('-', "_"),
        level,
        level,
        level
    )
}

/// Initialize logging with configuration
pub fn init_with_config(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.is_empty() => EnvFilter::try_new(env_str)?,
        _ => EnvFilter::try_new(default_filter(&config))?,
    };

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let slot = FILE_GUARD.get_or_init(|| Mutex::new(None));
            match slot.lock() {
                Ok(mut slot) => *slot = Some(guard),
                Err(poisoned) => *poisoned.into_inner() = Some(guard),
            }

            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed(),
            )
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    match &config.log_dir {
        Some(dir) => tracing::info!("Logging: {} @ {}", config.service_name, dir.display()),
        None => tracing::debug!("Logging: {} (console only)", config.service_name),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(&Level::INFO), "[INFO]");
        assert_eq!(format_level(&Level::WARN), "[WARN]");
        assert_eq!(format_level(&Level::ERROR), "[ERROR]");
    }

    #[test]
    fn test_default_filter_targets_service_and_libraries() {
        let config = LogConfig {
            service_name: "roll-migrate".to_string(),
            level: Level::DEBUG,
            ..Default::default()
        };
        assert_eq!(
            default_filter(&config),
            "warn,roll_migrate=debug,common=debug,roller_rules=debug"
        );
    }
}
