use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remark stored on records created on first contact
pub const AUTO_CREATED_REMARK: &str = "auto-created";

/// Subscription and quota state for a single identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// User or group id, primary key
    pub identity: String,
    /// Informational name, e.g. the chat nickname
    pub display_name: String,
    /// Set once when the record is created
    pub created_at: DateTime<Local>,
    /// End of the paid window; `None` counts as already expired
    pub expires_at: Option<DateTime<Local>>,
    /// Whether the paid plan is switched on
    pub active: bool,
    /// Free uses left in the current quota period
    pub free_quota_remaining: u32,
    /// Start of the next quota period; `None` until first initialised
    pub quota_reset_at: Option<DateTime<Local>>,
    pub remark: String,
}

/// Computed status shown to administrators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Expired,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Expired => write!(f, "expired"),
        }
    }
}

impl AccountRecord {
    /// Blank record with no paid time and an uninitialised quota.
    pub fn new(identity: impl Into<String>, now: DateTime<Local>) -> Self {
        AccountRecord {
            identity: identity.into(),
            display_name: String::new(),
            created_at: now,
            expires_at: None,
            active: false,
            free_quota_remaining: 0,
            quota_reset_at: None,
            remark: String::new(),
        }
    }

    /// Record created the first time an unknown identity shows up.
    ///
    /// It is immediately expired and has no free quota until the quota
    /// policy initialises it.
    pub fn first_contact(
        identity: impl Into<String>,
        display_name: Option<&str>,
        now: DateTime<Local>,
    ) -> Self {
        AccountRecord {
            display_name: display_name.unwrap_or_default().to_string(),
            expires_at: Some(now),
            remark: AUTO_CREATED_REMARK.to_string(),
            ..Self::new(identity, now)
        }
    }

    /// Record created on first contact when trials are enabled.
    pub fn trial(
        identity: impl Into<String>,
        display_name: Option<&str>,
        trial_days: u32,
        now: DateTime<Local>,
    ) -> Self {
        let mut record = Self::first_contact(identity, display_name, now);
        record.active = true;
        record.expires_at = Some(now + Duration::days(i64::from(trial_days)));
        record
    }

    /// An unset expiry is treated as already expired.
    pub fn is_expired_at(&self, now: DateTime<Local>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => true,
        }
    }

    /// Paid and inside the subscription window.
    pub fn has_paid_access_at(&self, now: DateTime<Local>) -> bool {
        self.active && !self.is_expired_at(now)
    }

    /// Relying on free quota (inactive or lapsed).
    pub fn is_free_tier_at(&self, now: DateTime<Local>) -> bool {
        !self.has_paid_access_at(now)
    }

    pub fn status_at(&self, now: DateTime<Local>) -> AccountStatus {
        if self.has_paid_access_at(now) {
            AccountStatus::Active
        } else {
            AccountStatus::Expired
        }
    }

    /// Switch the paid plan on for `days` days starting at `now`.
    pub fn activate_for(&mut self, days: i64, now: DateTime<Local>) {
        self.expires_at = Some(now + Duration::days(days));
        self.active = true;
    }
}
