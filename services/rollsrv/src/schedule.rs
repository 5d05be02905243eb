//! Roll scheduling
//!
//! A `RollSchedule` is a cron expression bound to an IANA timezone. The
//! `RollScheduler` sleeps until the next fire time, rolls a batch against the
//! settings current at that moment, and re-plans whenever the schedule
//! published by the settings watcher changes.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use rand::Rng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use common::{BotSettings, HotReloadingSettings, SettingsHandle};

use crate::delivery::{deliver_all, MessageSink};
use crate::error::{Result, RollSrvError};
use crate::roll::roll_for_users;

/// Cron expression and timezone as written in the settings file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSpec {
    pub cron: String,
    pub timezone: String,
}

impl From<&BotSettings> for ScheduleSpec {
    fn from(bot: &BotSettings) -> Self {
        Self {
            cron: bot.cron.clone(),
            timezone: bot.timezone.clone(),
        }
    }
}

/// Rewrite standard 5-field cron into the `cron` crate's dialect
///
/// A `0` seconds field is prepended and numeric weekdays are renumbered from
/// `0`/`7` = Sunday to the crate's `1` = Sunday. 6/7-field expressions are
/// already in the crate's dialect and pass through.
pub fn normalize_cron(expression: &str) -> String {
    let expression = expression.trim();
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.as_slice() {
        [minute, hour, day, month, weekday] => format!(
            "0 {} {} {} {} {}",
            minute,
            hour,
            day,
            month,
            convert_weekdays(weekday)
        ),
        _ => expression.to_string(),
    }
}

/// Renumber each numeric item of a weekday list; names and `*`/`?` pass through
fn convert_weekdays(field: &str) -> String {
    field
        .split(',')
        .map(|item| convert_weekday_item(item).unwrap_or_else(|| item.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

/// `n`, `a-b`, `a-b/s` or `*/s` with standard numbering, as an explicit list
fn convert_weekday_item(item: &str) -> Option<String> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, step.parse::<usize>().ok().filter(|&s| s > 0)?),
        None => (item, 1),
    };

    let (first, last) = match base {
        "*" | "?" if step > 1 => (0, 6),
        "*" | "?" => return None,
        _ => match base.split_once('-') {
            Some((a, b)) => (parse_weekday(a)?, parse_weekday(b)?),
            None if step > 1 => (parse_weekday(base)?, 6),
            None => {
                let day = parse_weekday(base)?;
                (day, day)
            },
        },
    };
    if first > last {
        return None;
    }

    let days: BTreeSet<u32> = (first..=last)
        .step_by(step)
        .map(|day| day % 7 + 1)
        .collect();
    Some(
        days.iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn parse_weekday(text: &str) -> Option<u32> {
    text.parse::<u32>().ok().filter(|&day| day <= 7)
}

/// Parsed cron schedule in a fixed timezone
#[derive(Debug, Clone)]
pub struct RollSchedule {
    spec: ScheduleSpec,
    schedule: Schedule,
    timezone: Tz,
}

impl RollSchedule {
    pub fn parse(cron: &str, timezone: &str) -> Result<Self> {
        let normalized = normalize_cron(cron);
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| RollSrvError::schedule(cron, e))?;
        let tz: Tz = timezone
            .trim()
            .parse()
            .map_err(|_| RollSrvError::Timezone(timezone.to_string()))?;

        Ok(Self {
            spec: ScheduleSpec {
                cron: cron.to_string(),
                timezone: timezone.to_string(),
            },
            schedule,
            timezone: tz,
        })
    }

    pub fn from_spec(spec: &ScheduleSpec) -> Result<Self> {
        Self::parse(&spec.cron, &spec.timezone)
    }

    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `now`, in the schedule's timezone
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        self.schedule
            .after(&now.with_timezone(&self.timezone))
            .next()
    }
}

/// Publish the `[bot]` schedule of every reload; only real changes wake receivers
pub fn watch_schedule(reloader: &HotReloadingSettings) -> watch::Receiver<ScheduleSpec> {
    let initial = ScheduleSpec::from(&reloader.snapshot().settings.bot);
    let (tx, rx) = watch::channel(initial);

    reloader.add_listener(move |snapshot| {
        let spec = ScheduleSpec::from(&snapshot.settings.bot);
        tx.send_if_modified(|current| {
            if *current == spec {
                return false;
            }
            info!(
                "Roll schedule changed: '{}' ({}) -> '{}' ({})",
                current.cron, current.timezone, spec.cron, spec.timezone
            );
            *current = spec;
            true
        });
    });

    rx
}

/// Runs roll batches on the configured schedule
pub struct RollScheduler<R> {
    settings: SettingsHandle,
    sink: Arc<dyn MessageSink>,
    rng: R,
    schedule_rx: watch::Receiver<ScheduleSpec>,
}

impl<R: Rng + Send> RollScheduler<R> {
    pub fn new(
        settings: SettingsHandle,
        sink: Arc<dyn MessageSink>,
        rng: R,
        schedule_rx: watch::Receiver<ScheduleSpec>,
    ) -> Self {
        Self {
            settings,
            sink,
            rng,
            schedule_rx,
        }
    }

    /// Roll and deliver one batch using the current settings
    ///
    /// Returns the number of messages delivered.
    pub async fn roll_once(&mut self) -> Result<usize> {
        let snapshot = self.settings.snapshot();
        if snapshot.settings.bot.users.is_empty() {
            info!("No users configured, skipping roll");
            return Ok(0);
        }

        let messages = roll_for_users(&mut self.rng, &snapshot)?;
        let delivered = deliver_all(self.sink.as_ref(), &messages).await;
        info!("Roll complete: {}/{} messages delivered", delivered, messages.len());
        Ok(delivered)
    }

    /// Run until `cancel` fires
    ///
    /// Fails only when the initial schedule is invalid; a bad schedule from a
    /// later reload is logged and the previous one stays in effect.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let initial = self.schedule_rx.borrow_and_update().clone();
        let mut schedule = RollSchedule::from_spec(&initial)?;
        let mut watching = true;
        let mut last_fire: Option<DateTime<Utc>> = None;

        info!(
            "Roll schedule: '{}' ({})",
            schedule.spec().cron,
            schedule.spec().timezone
        );

        loop {
            let now = Utc::now();
            let from = last_fire.map_or(now, |fired| fired.max(now));
            let next = schedule.next_after(from);

            let delay = match next {
                Some(at) => {
                    info!("Next roll at {}", at);
                    Some((at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
                },
                None => {
                    warn!("Schedule '{}' has no upcoming fire time", schedule.spec().cron);
                    None
                },
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Roll scheduler cancelled");
                    break;
                }
                changed = self.schedule_rx.changed(), if watching => {
                    if changed.is_err() {
                        debug!("Schedule publisher closed, keeping current schedule");
                        watching = false;
                        continue;
                    }
                    let spec = self.schedule_rx.borrow_and_update().clone();
                    match RollSchedule::from_spec(&spec) {
                        Ok(updated) => {
                            info!("Rescheduled roll job: '{}' ({})", spec.cron, spec.timezone);
                            schedule = updated;
                        },
                        Err(e) => warn!("Ignoring new schedule, keeping current one: {}", e),
                    }
                }
                _ = sleep_for(delay) => {
                    last_fire = next.map(|at| at.with_timezone(&Utc));
                    if let Err(e) = self.roll_once().await {
                        error!("Roll failed: {}", e);
                    }
                }
            }
        }

        Ok(())
    }
}

async fn sleep_for(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::delivery::MemorySink;
    use chrono::{TimeZone, Timelike};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn render_settings(cron: &str, users: &str) -> String {
        format!(
            r#"
[bot]
token = "abc123"
channel = 42
users = {users}
cron = "{cron}"
timezone = "UTC"

[roll]
min_number = 1
max_number = 6

[message]
default_message = "ok"
"#
        )
    }

    fn settings_file(dir: &TempDir, cron: &str) -> PathBuf {
        let path = dir.path().join("bot_settings.toml");
        std::fs::write(&path, render_settings(cron, "[1, 2]")).unwrap();
        path
    }

    #[test]
    fn test_normalize_cron() {
        assert_eq!(normalize_cron("0 9 * * *"), "0 0 9 * * *");
        assert_eq!(normalize_cron(" 30 0 9 * * * "), "30 0 9 * * *");
    }

    #[test]
    fn test_normalize_cron_renumbers_weekdays() {
        assert_eq!(normalize_cron("0 9 * * 1"), "0 0 9 * * 2");
        assert_eq!(normalize_cron("0 9 * * 0"), "0 0 9 * * 1");
        assert_eq!(normalize_cron("0 9 * * 7"), "0 0 9 * * 1");
        assert_eq!(normalize_cron("0 9 * * 1-5"), "0 0 9 * * 2,3,4,5,6");
        assert_eq!(normalize_cron("0 9 * * 5-7"), "0 0 9 * * 1,6,7");
        assert_eq!(normalize_cron("0 9 * * 0,3"), "0 0 9 * * 1,4");
        assert_eq!(normalize_cron("0 9 * * */2"), "0 0 9 * * 1,3,5,7");
        assert_eq!(normalize_cron("0 9 * * MON-FRI"), "0 0 9 * * MON-FRI");
        // Seconds-first expressions use the crate's numbering already
        assert_eq!(normalize_cron("0 0 9 * * 2"), "0 0 9 * * 2");
    }

    #[test]
    fn test_standard_weekday_numbers_fire_on_the_right_day() {
        use chrono::{Datelike, Weekday};

        // 2024-06-01 is a Saturday
        let saturday = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let monday = RollSchedule::parse("0 9 * * 1", "UTC").unwrap();
        assert_eq!(monday.next_after(saturday).unwrap().weekday(), Weekday::Mon);

        let weekdays = RollSchedule::parse("0 9 * * 1-5", "UTC").unwrap();
        assert_eq!(weekdays.next_after(saturday).unwrap().weekday(), Weekday::Mon);

        let sunday = RollSchedule::parse("0 9 * * 0", "UTC").unwrap();
        assert_eq!(sunday.next_after(saturday).unwrap().weekday(), Weekday::Sun);
        let sunday = RollSchedule::parse("0 9 * * 7", "UTC").unwrap();
        assert_eq!(sunday.next_after(saturday).unwrap().weekday(), Weekday::Sun);
    }

    #[test]
    fn test_next_after_respects_timezone() {
        let schedule = RollSchedule::parse("0 9 * * *", "Europe/Helsinki").unwrap();
        // 2024-06-01 05:00 UTC is 08:00 in Helsinki (UTC+3)
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 5, 0, 0).unwrap();
        let next = schedule.next_after(now).unwrap();

        assert_eq!(next.hour(), 9);
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_next_after_is_strictly_later() {
        let schedule = RollSchedule::parse("0 9 * * *", "UTC").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let next = schedule.next_after(now).unwrap();
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_cron_and_timezone() {
        assert!(matches!(
            RollSchedule::parse("not a cron", "UTC"),
            Err(RollSrvError::Schedule { .. })
        ));
        assert!(matches!(
            RollSchedule::parse("0 9 * * *", "Mars/Olympus"),
            Err(RollSrvError::Timezone(_))
        ));
    }

    #[test]
    fn test_watch_schedule_only_signals_changes() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir, "0 9 * * *");
        let reloader =
            HotReloadingSettings::new(&path, common::DEFAULT_POLL_INTERVAL).unwrap();
        let mut rx = watch_schedule(&reloader);
        assert_eq!(rx.borrow_and_update().cron, "0 9 * * *");

        // Users changed, schedule did not
        std::fs::write(&path, render_settings("0 9 * * *", "[1, 2, 3]")).unwrap();
        assert!(reloader.poll_once());
        assert!(!rx.has_changed().unwrap());

        std::fs::write(&path, render_settings("30 18 * * *", "[1, 2, 3]")).unwrap();
        assert!(reloader.poll_once());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().cron, "30 18 * * *");
    }

    #[tokio::test]
    async fn test_roll_once_delivers_to_every_user() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir, "0 9 * * *");
        let reloader =
            HotReloadingSettings::new(&path, common::DEFAULT_POLL_INTERVAL).unwrap();
        let sink = Arc::new(MemorySink::new());

        let mut scheduler = RollScheduler::new(
            reloader.handle(),
            sink.clone(),
            StdRng::seed_from_u64(1),
            watch_schedule(&reloader),
        );

        assert_eq!(scheduler.roll_once().await.unwrap(), 2);
        let messages = sink.messages();
        assert!(messages[0].content.starts_with("<@1> "));
        assert!(messages[1].content.starts_with("<@2> "));
        assert!(messages.iter().all(|m| m.content.ends_with(" ok")));
    }

    #[tokio::test]
    async fn test_scheduler_picks_up_new_schedule() {
        let dir = TempDir::new().unwrap();
        // Once a year: never fires during the test
        let path = settings_file(&dir, "0 0 1 1 *");
        let reloader =
            HotReloadingSettings::new(&path, common::DEFAULT_POLL_INTERVAL).unwrap();
        let sink = Arc::new(MemorySink::new());
        let (tx, rx) = watch::channel(ScheduleSpec::from(&reloader.snapshot().settings.bot));

        let scheduler =
            RollScheduler::new(reloader.handle(), sink.clone(), StdRng::seed_from_u64(2), rx);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.is_empty());

        // Every second
        tx.send(ScheduleSpec {
            cron: "* * * * * *".to_string(),
            timezone: "UTC".to_string(),
        })
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("no roll after reschedule");

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_scheduler_rejects_invalid_initial_schedule() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir, "0 9 * * *");
        let reloader =
            HotReloadingSettings::new(&path, common::DEFAULT_POLL_INTERVAL).unwrap();
        let (_tx, rx) = watch::channel(ScheduleSpec {
            cron: "61 * * * *".to_string(),
            timezone: "UTC".to_string(),
        });

        let scheduler = RollScheduler::new(
            reloader.handle(),
            Arc::new(MemorySink::new()),
            StdRng::seed_from_u64(3),
            rx,
        );
        assert!(scheduler.run(CancellationToken::new()).await.is_err());
    }
}
