//! Account records
//!
//! One [`AccountRecord`] per identity (a user id or a group id) holding the
//! paid subscription window and the daily free quota.

pub mod types;

pub use types::{AccountRecord, AccountStatus, AUTO_CREATED_REMARK};
