//! RollSrv - scheduled number rolls
//!
//! On every cron tick the service rolls one number per configured user,
//! composes each user's message through the rule engine, and hands the
//! result to a `MessageSink`. Settings are hot reloaded; a changed schedule
//! takes effect without a restart.

pub mod delivery;
pub mod error;
pub mod roll;
pub mod schedule;

pub use delivery::{deliver_all, LogSink, MemorySink, MessageSink};
pub use error::{Result, RollSrvError};
pub use roll::{format_roll_line, roll_for_users, OutgoingMessage, RollBatch, UserRoll};
pub use schedule::{normalize_cron, watch_schedule, RollSchedule, RollScheduler, ScheduleSpec};
