//! Roll batches
//!
//! One batch rolls a number per configured user, then composes each user's
//! message with the batch extrema feeding the `highest`/`lowest` keywords.

use rand::Rng;
use roller_rules::{generate_message, RollBounds, RuleError};
use tracing::debug;

use common::{RollSettings, SettingsSnapshot};

use crate::error::Result;

/// One user's rolled number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRoll {
    pub user_id: u64,
    pub number: i64,
}

/// A message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub channel_id: u64,
    pub user_id: u64,
    pub number: i64,
    pub content: String,
}

/// Numbers rolled in one scheduled run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollBatch {
    pub rolls: Vec<UserRoll>,
}

impl RollBatch {
    /// Roll one number in `[min_number, max_number]` for every user, in order
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        users: &[u64],
        roll: &RollSettings,
    ) -> Result<Self> {
        if roll.min_number > roll.max_number {
            return Err(RuleError::InvalidBounds {
                lowest: roll.min_number,
                highest: roll.max_number,
            }
            .into());
        }

        let rolls = users
            .iter()
            .map(|&user_id| UserRoll {
                user_id,
                number: rng.gen_range(roll.min_number..=roll.max_number),
            })
            .collect();

        Ok(Self { rolls })
    }

    pub fn from_rolls(rolls: impl IntoIterator<Item = UserRoll>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rolls.is_empty()
    }

    /// Lowest and highest number of the batch
    pub fn extrema(&self) -> Option<(i64, i64)> {
        let lowest = self.rolls.iter().map(|r| r.number).min()?;
        let highest = self.rolls.iter().map(|r| r.number).max()?;
        Some((lowest, highest))
    }

    /// Compose every user's message against `snapshot`
    pub fn compose(&self, snapshot: &SettingsSnapshot) -> Result<Vec<OutgoingMessage>> {
        let settings = &snapshot.settings;
        let mut bounds = RollBounds::new(settings.roll.min_number, settings.roll.max_number);
        if let Some((lowest, highest)) = self.extrema() {
            bounds = bounds.with_roll_extrema(lowest, highest);
        }

        let mut messages = Vec::with_capacity(self.rolls.len());
        for roll in &self.rolls {
            let additional = generate_message(
                roll.number,
                &bounds,
                &settings.message.default_message,
                &snapshot.rules,
            )?;
            let content = format_roll_line(
                roll.user_id,
                &settings.message.render_number(roll.number),
                &additional,
            );
            debug!("User {} rolled {}", roll.user_id, roll.number);

            messages.push(OutgoingMessage {
                channel_id: settings.bot.channel,
                user_id: roll.user_id,
                number: roll.number,
                content,
            });
        }
        Ok(messages)
    }
}

/// `<@user> {number line} {additional}`, without trailing blanks
pub fn format_roll_line(user_id: u64, number_line: &str, additional: &str) -> String {
    format!("<@{}> {} {}", user_id, number_line, additional)
        .trim_end()
        .to_string()
}

/// Roll and compose a full batch for the current settings
pub fn roll_for_users<R: Rng + ?Sized>(
    rng: &mut R,
    snapshot: &SettingsSnapshot,
) -> Result<Vec<OutgoingMessage>> {
    let settings = &snapshot.settings;
    let batch = RollBatch::generate(rng, &settings.bot.users, &settings.roll)?;
    batch.compose(snapshot)
}
