//! Administrator commands
//!
//! Text commands such as `$account add wxid_42 30 Alice vip` that let an
//! administrator create, renew, inspect and delete account records from
//! inside a chat. The same handler backs the `account-admin` CLI.

pub mod commands;
pub mod handler;

pub use commands::{help_text, AdminCommand, MAX_DAYS};
pub use handler::AdminCommandHandler;
