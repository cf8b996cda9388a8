use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use super::admins::AdminSet;
use super::event::{Decision, Grant, InboundEvent, Outcome, Verdict};
use crate::account::AccountRecord;
use crate::admin::{AdminCommand, AdminCommandHandler};
use crate::config::{AccessConfig, AccountConfig};
use crate::error::{AccountError, Result};
use crate::quota::{QuotaHint, QuotaPolicy};
use crate::storage::AccountStore;

/// Single entry point for access decisions and reply decoration
#[derive(Clone)]
pub struct AccessGate {
    store: AccountStore,
    admins: AdminSet,
    policy: QuotaPolicy,
    hint: QuotaHint,
    access: AccessConfig,
    commands: AdminCommandHandler,
}

impl AccessGate {
    pub fn new(store: AccountStore, config: &AccountConfig) -> Self {
        let commands = AdminCommandHandler::new(store.clone(), &config.access.command_prefix);

        Self {
            admins: config.access.admin_ids.iter().cloned().collect(),
            policy: QuotaPolicy::from_config(&config.quota),
            hint: QuotaHint::from_config(&config.quota),
            access: config.access.clone(),
            commands,
            store,
        }
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    pub fn admins(&self) -> &AdminSet {
        &self.admins
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Handle one inbound event at the current time.
    pub async fn handle(&self, event: &InboundEvent) -> Outcome {
        self.handle_at(event, Local::now()).await
    }

    /// Handle one inbound event.
    ///
    /// Admin commands are executed and answered; everything else goes
    /// through the access check. Failures are logged and turned into a
    /// stop-and-reply so one bad event cannot take the host down.
    pub async fn handle_at(&self, event: &InboundEvent, now: DateTime<Local>) -> Outcome {
        if let Some(text) = self.admin_command_text(event) {
            info!("Admin command from {}", event.sender_id);
            return Outcome::reply_and_stop(self.commands.respond(text, now).await);
        }

        match self.evaluate_event(event, now).await {
            Ok(decision) => match decision.verdict {
                Verdict::Allow { .. } => Outcome::proceed(),
                Verdict::Deny { reply } => Outcome::reply_and_stop(reply),
            },
            Err(e) => {
                error!(
                    "Access check failed for {} (group {:?}): {}",
                    event.sender_id, event.group_id, e
                );
                Outcome::reply_and_stop(self.access.failure_reply.clone())
            }
        }
    }

    /// Decide an event, applying group-over-individual precedence.
    pub async fn evaluate_event(
        &self,
        event: &InboundEvent,
        now: DateTime<Local>,
    ) -> Result<Decision> {
        if self.admins.contains(&event.sender_id) {
            return Ok(admin_decision(&event.sender_id));
        }

        let Some(group_id) = event.group_id.as_deref() else {
            return self
                .evaluate(&event.sender_id, event.sender_name.as_deref(), now)
                .await;
        };

        let group = self
            .evaluate(group_id, event.group_name.as_deref(), now)
            .await?;
        if !group.is_allowed() {
            warn!(
                "Group {} is blocked, dropping message from {}",
                group_id, event.sender_id
            );
            return Ok(group);
        }
        if !self.access.check_group_members {
            return Ok(group);
        }

        self.evaluate(&event.sender_id, event.sender_name.as_deref(), now)
            .await
    }

    /// Decide whether `identity` may proceed at `now`.
    ///
    /// Lookup, lazy creation and quota consumption share one unit of work,
    /// committed before the decision is returned.
    pub async fn evaluate(
        &self,
        identity: &str,
        display_name: Option<&str>,
        now: DateTime<Local>,
    ) -> Result<Decision> {
        if self.admins.contains(identity) {
            return Ok(admin_decision(identity));
        }

        let mut uow = self.store.begin().await?;

        // Write before reading so the unit holds the write lock throughout
        let fresh = self.first_contact_record(identity, display_name, now);
        if uow.insert_if_absent(&fresh).await? {
            info!("Created account record for {} on first contact", identity);
        }
        let mut record = uow.find_by_identity(identity).await?.ok_or_else(|| {
            AccountError::Storage(format!("Account {} missing after insert", identity))
        })?;

        if record.has_paid_access_at(now) {
            uow.commit().await?;
            debug!("{} allowed on paid plan", identity);
            return Ok(Decision {
                identity: identity.to_string(),
                verdict: Verdict::Allow { grant: Grant::Paid },
                account: Some(record),
            });
        }

        let consumed = self.policy.consume(&mut uow, &mut record, now).await?;
        uow.commit().await?;

        let verdict = if consumed {
            Verdict::Allow {
                grant: Grant::FreeQuota,
            }
        } else {
            warn!("{} denied: no paid plan and no free quota left", identity);
            Verdict::Deny {
                reply: self.access.denied_reply_for(identity),
            }
        };

        Ok(Decision {
            identity: identity.to_string(),
            verdict,
            account: Some(record),
        })
    }

    /// Append the quota hint to a reply about to be sent for `event`.
    ///
    /// The hint reflects the identity whose pool the event draws from. A
    /// failed lookup leaves the reply as it is.
    pub async fn decorate_reply(&self, event: &InboundEvent, reply: &str) -> String {
        self.decorate_reply_at(event, reply, Local::now()).await
    }

    pub async fn decorate_reply_at(
        &self,
        event: &InboundEvent,
        reply: &str,
        now: DateTime<Local>,
    ) -> String {
        if self.admins.contains(&event.sender_id) {
            return reply.to_string();
        }

        let subject = event.subject();
        match self.store.find_by_identity(subject).await {
            Ok(record) => self.hint.decorate(reply, record.as_ref(), now),
            Err(e) => {
                warn!("Could not load {} for quota hint: {}", subject, e);
                reply.to_string()
            }
        }
    }

    fn admin_command_text<'a>(&self, event: &'a InboundEvent) -> Option<&'a str> {
        let text = event.text.as_deref()?;
        let is_command = AdminCommand::matches(self.commands.prefix(), text);
        (is_command && self.admins.contains(&event.sender_id)).then_some(text)
    }

    fn first_contact_record(
        &self,
        identity: &str,
        display_name: Option<&str>,
        now: DateTime<Local>,
    ) -> AccountRecord {
        if self.access.grant_trial_on_first_contact {
            AccountRecord::trial(identity, display_name, self.access.default_trial_days, now)
        } else {
            AccountRecord::first_contact(identity, display_name, now)
        }
    }
}

fn admin_decision(identity: &str) -> Decision {
    debug!("{} is an administrator, skipping checks", identity);
    Decision {
        identity: identity.to_string(),
        verdict: Verdict::Allow {
            grant: Grant::Admin,
        },
        account: None,
    }
}
