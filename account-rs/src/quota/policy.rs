use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
use tracing::{debug, info};

use crate::account::AccountRecord;
use crate::config::QuotaConfig;
use crate::error::Result;
use crate::storage::UnitOfWork;

pub const DEFAULT_DAILY_LIMIT: u32 = 30;

/// Reset and consumption rules for the daily free quota
///
/// All decisions are pure functions of the record, the current time and the
/// daily limit. Persisting the result is the caller's unit of work.
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    daily_limit: u32,
}

impl QuotaPolicy {
    pub fn new(daily_limit: u32) -> Self {
        QuotaPolicy { daily_limit }
    }

    pub fn from_config(config: &QuotaConfig) -> Self {
        Self::new(config.daily_free_limit)
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// The quota needs a reset when it was never initialised or the reset
    /// boundary has passed.
    pub fn should_reset(&self, record: &AccountRecord, now: DateTime<Local>) -> bool {
        match record.quota_reset_at {
            Some(reset_at) => reset_at <= now,
            None => true,
        }
    }

    /// Refill the quota and move the boundary to the next local midnight.
    pub fn apply_reset(&self, record: &mut AccountRecord, now: DateTime<Local>) {
        let reset_at = next_midnight(now);
        record.free_quota_remaining = self.daily_limit;
        record.quota_reset_at = Some(reset_at);
        info!(
            "Free quota for {} reset to {}, next reset at {}",
            record.identity,
            self.daily_limit,
            reset_at.format("%Y-%m-%d %H:%M")
        );
    }

    /// Take one free use, resetting first if the period has rolled over.
    ///
    /// Returns `false` when nothing is left; the record is then unchanged
    /// apart from a possible reset.
    pub fn try_consume(&self, record: &mut AccountRecord, now: DateTime<Local>) -> bool {
        if self.should_reset(record, now) {
            self.apply_reset(record, now);
        }

        if record.free_quota_remaining == 0 {
            debug!("No free quota left for {}", record.identity);
            return false;
        }

        record.free_quota_remaining -= 1;
        debug!(
            "Consumed free use for {}, {} left",
            record.identity, record.free_quota_remaining
        );
        true
    }

    /// [`try_consume`](Self::try_consume) and write the result into `uow`.
    ///
    /// The caller commits; until then a crash leaves the stored quota as it was.
    pub async fn consume(
        &self,
        uow: &mut UnitOfWork,
        record: &mut AccountRecord,
        now: DateTime<Local>,
    ) -> Result<bool> {
        let before = (record.free_quota_remaining, record.quota_reset_at);
        let consumed = self.try_consume(record, now);

        if (record.free_quota_remaining, record.quota_reset_at) != before {
            uow.upsert(record).await?;
        }
        Ok(consumed)
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_LIMIT)
    }
}

/// First local midnight strictly after `now`.
///
/// This is the calendar boundary, not `now + 24h`. When midnight does not
/// exist locally (a DST jump at 00:00) the first valid instant of that day
/// is used instead.
pub fn next_midnight(now: DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .succ_opt()
        .and_then(first_instant_of)
        .unwrap_or_else(|| now + Duration::days(1))
}

fn first_instant_of(day: NaiveDate) -> Option<DateTime<Local>> {
    (0..=2).find_map(|hour| {
        day.and_hms_opt(hour, 0, 0)
            .and_then(|t| Local.from_local_datetime(&t).earliest())
    })
}
