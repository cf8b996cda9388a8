//! account-rs: subscription and free-quota gate for chat bots
//!
//! Decides, for any user or group identity, whether a request may proceed:
//! administrators always pass, identities with an active paid plan pass,
//! everyone else draws from a daily free quota that refills at local
//! midnight.
//!
//! # Example
//!
//! ```no_run
//! use account_rs::access::{AccessGate, InboundEvent};
//! use account_rs::config::AccountConfig;
//! use account_rs::storage::StoreRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AccountConfig::load_or_default("account.toml");
//!     let registry = StoreRegistry::new();
//!     let store = registry.open(&config.storage).await?;
//!     let gate = AccessGate::new(store, &config);
//!
//!     let event = InboundEvent::direct("wxid_42").with_text("hello");
//!     let outcome = gate.handle(&event).await;
//!     if let Some(reply) = outcome.reply {
//!         println!("{}", reply);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`account`]: the per-identity record
//! - [`storage`]: SQLite persistence and units of work
//! - [`quota`]: daily free quota rules and the reply hint
//! - [`access`]: the access decision
//! - [`admin`]: administrator commands
//! - [`config`]: configuration management
//! - [`error`]: error types

pub mod access;
pub mod account;
pub mod admin;
pub mod config;
pub mod error;
pub mod logging;
pub mod quota;
pub mod storage;

// Re-export commonly used types
pub use access::{AccessGate, InboundEvent, Outcome};
pub use account::AccountRecord;
pub use config::AccountConfig;
pub use error::{AccountError, Result};
pub use storage::{AccountStore, StoreRegistry};
