/// Daily free quota
///
/// This module provides:
/// - Calendar-aligned reset of the free quota at local midnight
/// - Consumption of one free use per request
/// - The quota hint appended to replies for free-tier identities

pub mod hint;
pub mod policy;

pub use hint::{QuotaHint, DEFAULT_HINT_THRESHOLD};
pub use policy::{next_midnight, QuotaPolicy, DEFAULT_DAILY_LIMIT};
