use serde::{Deserialize, Serialize};

use crate::account::AccountRecord;

/// An inbound chat event, as far as access control cares
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// The individual who sent the message
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Set when the message was posted in a group
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    /// Message text; absent for images, voice and other non-text events
    #[serde(default)]
    pub text: Option<String>,
}

impl InboundEvent {
    pub fn direct(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            ..Default::default()
        }
    }

    pub fn in_group(sender_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            group_id: Some(group_id.into()),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// The identity whose quota pool the event draws from.
    pub fn subject(&self) -> &str {
        self.group_id.as_deref().unwrap_or(&self.sender_id)
    }
}

/// Why an identity was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    Admin,
    Paid,
    FreeQuota,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum Verdict {
    Allow { grant: Grant },
    Deny { reply: String },
}

/// Result of evaluating one identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// The identity that was evaluated
    pub identity: String,
    pub verdict: Verdict,
    /// Record state after the decision; `None` for administrators
    pub account: Option<AccountRecord>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self.verdict, Verdict::Allow { .. })
    }

    pub fn grant(&self) -> Option<Grant> {
        match self.verdict {
            Verdict::Allow { grant } => Some(grant),
            Verdict::Deny { .. } => None,
        }
    }
}

/// What the host should do with the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    /// Hand the event on to the rest of the bot
    Continue,
    /// Stop processing; send the reply if there is one
    Break,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub action: EventAction,
    pub reply: Option<String>,
}

impl Outcome {
    pub fn proceed() -> Self {
        Self {
            action: EventAction::Continue,
            reply: None,
        }
    }

    pub fn reply_and_stop(reply: impl Into<String>) -> Self {
        Self {
            action: EventAction::Break,
            reply: Some(reply.into()),
        }
    }

    pub fn is_break(&self) -> bool {
        self.action == EventAction::Break
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_prefers_group() {
        assert_eq!(InboundEvent::direct("u1").subject(), "u1");
        assert_eq!(InboundEvent::in_group("u1", "g1").subject(), "g1");
    }

    #[test]
    fn test_event_deserializes_with_only_sender() {
        let event: InboundEvent = serde_json::from_str(r#"{"sender_id":"u1"}"#).unwrap();
        assert_eq!(event, InboundEvent::direct("u1"));
        assert!(!event.is_group());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(Outcome::reply_and_stop("no")).unwrap();
        assert_eq!(json["action"], "break");
        assert_eq!(json["reply"], "no");

        let json = serde_json::to_value(Outcome::proceed()).unwrap();
        assert_eq!(json["action"], "continue");
        assert!(json["reply"].is_null());
    }
}
