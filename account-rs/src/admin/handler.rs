use chrono::{DateTime, Local};
use std::fmt::Write;
use tracing::{error, info, warn};

use super::commands::{help_text, AdminCommand};
use crate::account::AccountRecord;
use crate::error::{AccountError, Result};
use crate::storage::AccountStore;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Executes [`AdminCommand`]s against the account store
///
/// Callers are responsible for checking that the sender is an administrator.
#[derive(Clone)]
pub struct AdminCommandHandler {
    store: AccountStore,
    prefix: String,
}

impl AdminCommandHandler {
    pub fn new(store: AccountStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Parse and run `text`, always producing a reply.
    ///
    /// Errors never escape: bad input is explained to the administrator,
    /// storage failures are logged and reported generically.
    pub async fn respond(&self, text: &str, now: DateTime<Local>) -> String {
        let result = match AdminCommand::parse(&self.prefix, text) {
            Ok(command) => self.execute(&command, now).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => reply,
            Err(e) if e.is_storage() => {
                error!("Admin command '{}' failed: {}", text.trim(), e);
                e.user_message()
            }
            Err(e) => {
                warn!("Rejected admin command '{}': {}", text.trim(), e);
                e.user_message()
            }
        }
    }

    /// Run a parsed command and render its reply.
    pub async fn execute(&self, command: &AdminCommand, now: DateTime<Local>) -> Result<String> {
        match command {
            AdminCommand::Help => Ok(help_text(&self.prefix)),
            AdminCommand::Add {
                identity,
                days,
                display_name,
                remark,
            } => {
                let record = self
                    .add(identity, *days, display_name.as_deref(), remark.as_deref(), now)
                    .await?;
                Ok(format!(
                    "Account {} added/updated, expires at {}",
                    record.identity,
                    format_time(record.expires_at)
                ))
            }
            AdminCommand::Delete { identity } => {
                self.delete(identity).await?;
                Ok(format!("Account {} deleted", identity))
            }
            AdminCommand::List => {
                let records = self.store.list_all().await?;
                Ok(render_list(&records, now))
            }
            AdminCommand::Info { identity } => {
                let record = self
                    .store
                    .find_by_identity(identity)
                    .await?
                    .ok_or_else(|| AccountError::NotFound(identity.clone()))?;
                Ok(render_info(&record, now))
            }
        }
    }

    /// Create or renew a paid account for `days` days from `now`.
    ///
    /// An existing record keeps its creation time and quota state; its name
    /// and remark are only replaced when new values are given.
    pub async fn add(
        &self,
        identity: &str,
        days: i64,
        display_name: Option<&str>,
        remark: Option<&str>,
        now: DateTime<Local>,
    ) -> Result<AccountRecord> {
        let mut uow = self.store.begin().await?;

        let mut record = uow
            .find_by_identity(identity)
            .await?
            .unwrap_or_else(|| AccountRecord::new(identity, now));

        if let Some(name) = display_name {
            record.display_name = name.to_string();
        }
        if let Some(remark) = remark {
            record.remark = remark.to_string();
        }
        record.activate_for(days, now);

        uow.upsert(&record).await?;
        uow.commit().await?;

        info!(
            "Account {} activated for {} days, expires at {}",
            identity,
            days,
            format_time(record.expires_at)
        );
        Ok(record)
    }

    /// Delete an account, failing with [`AccountError::NotFound`] if absent.
    pub async fn delete(&self, identity: &str) -> Result<()> {
        if !self.store.delete(identity).await? {
            return Err(AccountError::NotFound(identity.to_string()));
        }
        info!("Account {} deleted", identity);
        Ok(())
    }
}

fn format_time(t: Option<DateTime<Local>>) -> String {
    match t {
        Some(t) => t.format(TIME_FORMAT).to_string(),
        None => "never set".to_string(),
    }
}

fn render_list(records: &[AccountRecord], now: DateTime<Local>) -> String {
    if records.is_empty() {
        return "No accounts yet".to_string();
    }

    let mut out = String::from("Accounts:\n");
    for record in records {
        let _ = writeln!(out, "ID: {}", record.identity);
        let _ = writeln!(out, "Name: {}", record.display_name);
        let _ = writeln!(out, "Status: {}", record.status_at(now));
        let _ = writeln!(out, "Expires: {}", format_time(record.expires_at));
        let _ = writeln!(out, "Remark: {}", record.remark);
        out.push_str("----------\n");
    }
    let _ = write!(out, "Total: {}", records.len());
    out
}

fn render_info(record: &AccountRecord, now: DateTime<Local>) -> String {
    let reset = match record.quota_reset_at {
        Some(t) => format!("resets at {}", t.format(TIME_FORMAT)),
        None => "not initialised".to_string(),
    };

    format!(
        "Account info:\n\
         ID: {}\n\
         Name: {}\n\
         Status: {}\n\
         Created: {}\n\
         Expires: {}\n\
         Free uses left: {} ({})\n\
         Remark: {}",
        record.identity,
        record.display_name,
        record.status_at(now),
        record.created_at.format(TIME_FORMAT),
        format_time(record.expires_at),
        record.free_quota_remaining,
        reset,
        record.remark
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use chrono::{Duration, TimeZone};

    async fn handler() -> AdminCommandHandler {
        let store = AccountStore::open(&StorageConfig::in_memory()).await.unwrap();
        AdminCommandHandler::new(store, "$account")
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_add_creates_active_record() {
        let handler = handler().await;
        let reply = handler.respond("$account add user123 30", now()).await;
        assert!(reply.contains("user123"));
        assert!(reply.contains("2024-07-01 12:00:00"));

        let record = handler.store.find_by_identity("user123").await.unwrap().unwrap();
        assert!(record.active);
        assert_eq!(record.expires_at, Some(now() + Duration::days(30)));
        assert_eq!(record.created_at, now());
    }

    #[tokio::test]
    async fn test_add_renews_existing_record_and_keeps_quota() {
        let handler = handler().await;
        let mut existing = AccountRecord::first_contact("user123", Some("Bob"), now() - Duration::days(10));
        existing.free_quota_remaining = 4;
        handler.store.upsert(&existing).await.unwrap();

        handler
            .respond("$account add user123 10 Robert renewed by hand", now())
            .await;

        let record = handler.store.find_by_identity("user123").await.unwrap().unwrap();
        assert_eq!(record.display_name, "Robert");
        assert_eq!(record.remark, "renewed by hand");
        assert_eq!(record.created_at, existing.created_at);
        assert_eq!(record.free_quota_remaining, 4);
        assert!(record.has_paid_access_at(now()));
    }

    #[tokio::test]
    async fn test_bad_days_does_not_touch_storage() {
        let handler = handler().await;
        let reply = handler.respond("$account add user123 lots", now()).await;
        assert!(reply.contains("Invalid day count"));
        assert_eq!(handler.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_reports_not_found() {
        let handler = handler().await;
        let reply = handler.respond("$account del ghost", now()).await;
        assert_eq!(reply, "Account ghost does not exist");

        let err = handler.delete("ghost").await.unwrap_err();
        assert!(matches!(err, AccountError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_existing() {
        let handler = handler().await;
        handler.add("user123", 5, None, None, now()).await.unwrap();

        let reply = handler.respond("$account del user123", now()).await;
        assert_eq!(reply, "Account user123 deleted");
        assert!(handler.store.find_by_identity("user123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_shows_computed_status() {
        let handler = handler().await;
        assert_eq!(handler.respond("$account list", now()).await, "No accounts yet");

        handler.add("paid_user", 30, Some("Paid"), None, now()).await.unwrap();
        handler
            .store
            .upsert(&AccountRecord::first_contact("lapsed_user", None, now()))
            .await
            .unwrap();

        let reply = handler.respond("$account list", now()).await;
        assert!(reply.starts_with("Accounts:\n"));
        assert!(reply.contains("ID: paid_user\nName: Paid\nStatus: active"));
        assert!(reply.contains("ID: lapsed_user\nName: \nStatus: expired"));
        assert!(reply.ends_with("Total: 2"));
    }

    #[tokio::test]
    async fn test_info() {
        let handler = handler().await;
        handler
            .add("user123", 30, Some("Alice"), Some("vip"), now())
            .await
            .unwrap();

        let reply = handler.respond("$account info user123", now()).await;
        assert!(reply.contains("ID: user123"));
        assert!(reply.contains("Name: Alice"));
        assert!(reply.contains("Status: active"));
        assert!(reply.contains("Created: 2024-06-01 12:00:00"));
        assert!(reply.contains("Free uses left: 0 (not initialised)"));
        assert!(reply.contains("Remark: vip"));

        let missing = handler.respond("$account info nobody", now()).await;
        assert_eq!(missing, "Account nobody does not exist");
    }

    #[tokio::test]
    async fn test_help() {
        let handler = handler().await;
        let reply = handler.respond("$account", now()).await;
        assert!(reply.starts_with("Account management commands:"));
    }
}
