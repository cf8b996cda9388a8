use chrono::{DateTime, Duration, Local};

use super::policy::{next_midnight, DEFAULT_DAILY_LIMIT};
use crate::account::AccountRecord;
use crate::config::QuotaConfig;

pub const DEFAULT_HINT_THRESHOLD: u32 = 3;

/// Appends a "free uses left" note to replies for free-tier identities
/// that are running low.
#[derive(Debug, Clone, Copy)]
pub struct QuotaHint {
    threshold: u32,
    daily_limit: u32,
}

impl QuotaHint {
    pub fn new(threshold: u32, daily_limit: u32) -> Self {
        QuotaHint {
            threshold,
            daily_limit,
        }
    }

    pub fn from_config(config: &QuotaConfig) -> Self {
        Self::new(config.hint_threshold, config.daily_free_limit)
    }

    /// The note for `record`, or `None` when no note is due.
    ///
    /// Once the reset boundary has passed, the stored count is stale: the
    /// next use refills to the daily limit, so that is what gets reported.
    pub fn render(&self, record: &AccountRecord, now: DateTime<Local>) -> Option<String> {
        if record.has_paid_access_at(now) {
            return None;
        }

        let (remaining, when) = match record.quota_reset_at {
            None => (
                record.free_quota_remaining,
                "resets at next midnight".to_string(),
            ),
            Some(reset_at) if reset_at <= now => (
                self.daily_limit,
                format!("resets in {}", format_eta(next_midnight(now) - now)),
            ),
            Some(reset_at) => (
                record.free_quota_remaining,
                format!("resets in {}", format_eta(reset_at - now)),
            ),
        };

        if remaining > self.threshold {
            return None;
        }
        Some(format!("[Free uses left today: {}, {}]", remaining, when))
    }

    /// `reply` with the note appended when one is due.
    pub fn decorate(
        &self,
        reply: &str,
        record: Option<&AccountRecord>,
        now: DateTime<Local>,
    ) -> String {
        match record.and_then(|r| self.render(r, now)) {
            Some(note) if reply.is_empty() => note,
            Some(note) => format!("{}\n\n{}", reply, note),
            None => reply.to_string(),
        }
    }
}

impl Default for QuotaHint {
    fn default() -> Self {
        Self::new(DEFAULT_HINT_THRESHOLD, DEFAULT_DAILY_LIMIT)
    }
}

/// `3h 12m`, or `45m` under an hour. Partial minutes round up.
fn format_eta(remaining: Duration) -> String {
    let minutes = (remaining.num_seconds().max(0) + 59) / 60;
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
