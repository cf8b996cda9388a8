use crate::error::{AccountError, Result};

/// Largest day count accepted by `add`
pub const MAX_DAYS: i64 = 36_500;

/// A parsed administrator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Prefix alone: show usage
    Help,
    /// Create or renew a paid account
    Add {
        identity: String,
        days: i64,
        display_name: Option<String>,
        remark: Option<String>,
    },
    /// Delete an account
    Delete { identity: String },
    /// List every account
    List,
    /// Show one account in detail
    Info { identity: String },
}

impl AdminCommand {
    /// Whether `text` is addressed to the command surface.
    pub fn matches(prefix: &str, text: &str) -> bool {
        text.split_whitespace().next() == Some(prefix)
    }

    /// Parse `text` (including the prefix).
    ///
    /// Wrong argument counts and bad day counts are validation errors; the
    /// message is meant to be shown to the administrator as is.
    pub fn parse(prefix: &str, text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split_whitespace().collect();

        if parts.first() != Some(&prefix) {
            return Err(AccountError::Validation(format!(
                "Commands must start with {}",
                prefix
            )));
        }

        let Some(cmd) = parts.get(1) else {
            return Ok(AdminCommand::Help);
        };

        match *cmd {
            "add" => {
                if parts.len() < 4 {
                    return Err(usage_error(prefix, "add <identity> <days> [display_name] [remark]"));
                }
                let days = parse_days(parts[3])?;
                let display_name = parts.get(4).map(|s| s.to_string());
                let remark = if parts.len() > 5 {
                    Some(parts[5..].join(" "))
                } else {
                    None
                };

                Ok(AdminCommand::Add {
                    identity: parts[2].to_string(),
                    days,
                    display_name,
                    remark,
                })
            }
            "del" => {
                if parts.len() != 3 {
                    return Err(usage_error(prefix, "del <identity>"));
                }
                Ok(AdminCommand::Delete {
                    identity: parts[2].to_string(),
                })
            }
            "list" => Ok(AdminCommand::List),
            "info" => {
                if parts.len() != 3 {
                    return Err(usage_error(prefix, "info <identity>"));
                }
                Ok(AdminCommand::Info {
                    identity: parts[2].to_string(),
                })
            }
            other => Err(AccountError::Validation(format!(
                "Unknown command: {}\nSend {} for help",
                other, prefix
            ))),
        }
    }
}

/// Usage text shown for the bare prefix.
pub fn help_text(prefix: &str) -> String {
    format!(
        "Account management commands:\n\
         {p} add <identity> <days> [display_name] [remark] - add or renew an account\n\
         {p} del <identity> - delete an account\n\
         {p} list - list all accounts\n\
         {p} info <identity> - show account details",
        p = prefix
    )
}

fn usage_error(prefix: &str, usage: &str) -> AccountError {
    AccountError::Validation(format!("Invalid format, usage: {} {}", prefix, usage))
}

fn parse_days(raw: &str) -> Result<i64> {
    let days: i64 = raw.parse().map_err(|_| {
        AccountError::Validation(format!("Invalid day count '{}': expected a whole number", raw))
    })?;

    if !(1..=MAX_DAYS).contains(&days) {
        return Err(AccountError::Validation(format!(
            "Invalid day count {}: must be between 1 and {}",
            days, MAX_DAYS
        )));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: &str = "$account";

    #[test]
    fn test_matches_prefix_token_only() {
        assert!(AdminCommand::matches(P, "$account list"));
        assert!(AdminCommand::matches(P, "  $account"));
        assert!(!AdminCommand::matches(P, "$accountlist"));
        assert!(!AdminCommand::matches(P, "hello $account"));
    }

    #[test]
    fn test_bare_prefix_is_help() {
        assert_eq!(AdminCommand::parse(P, "$account").unwrap(), AdminCommand::Help);
    }

    #[test]
    fn test_parse_add_full() {
        let cmd = AdminCommand::parse(P, "$account add user123 30 Alice paid via transfer").unwrap();
        assert_eq!(
            cmd,
            AdminCommand::Add {
                identity: "user123".to_string(),
                days: 30,
                display_name: Some("Alice".to_string()),
                remark: Some("paid via transfer".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_add_minimal() {
        let cmd = AdminCommand::parse(P, "$account add user123 7").unwrap();
        assert_eq!(
            cmd,
            AdminCommand::Add {
                identity: "user123".to_string(),
                days: 7,
                display_name: None,
                remark: None,
            }
        );
    }

    #[test]
    fn test_add_with_missing_arguments() {
        let err = AdminCommand::parse(P, "$account add user123").unwrap_err();
        assert!(err.user_message().contains("usage: $account add"));
    }

    #[test]
    fn test_add_with_non_numeric_days() {
        let err = AdminCommand::parse(P, "$account add user123 thirty").unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
        assert!(err.user_message().contains("thirty"));
    }

    #[test]
    fn test_add_with_out_of_range_days() {
        assert!(AdminCommand::parse(P, "$account add user123 0").is_err());
        assert!(AdminCommand::parse(P, "$account add user123 -5").is_err());
        assert!(AdminCommand::parse(P, "$account add user123 99999999999").is_err());
        assert!(AdminCommand::parse(P, "$account add user123 36500").is_ok());
    }

    #[test]
    fn test_del_and_info_need_exactly_one_identity() {
        assert!(AdminCommand::parse(P, "$account del").is_err());
        assert!(AdminCommand::parse(P, "$account del a b").is_err());
        assert!(AdminCommand::parse(P, "$account info").is_err());
        assert_eq!(
            AdminCommand::parse(P, "$account info a").unwrap(),
            AdminCommand::Info {
                identity: "a".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_subcommand() {
        let err = AdminCommand::parse(P, "$account frobnicate").unwrap_err();
        let msg = err.user_message();
        assert!(msg.contains("Unknown command: frobnicate"));
        assert!(msg.contains("$account"));
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(AdminCommand::parse("#acc", "#acc list").unwrap(), AdminCommand::List);
        assert!(AdminCommand::parse("#acc", "$account list").is_err());
    }

    #[test]
    fn test_help_text_mentions_every_command() {
        let help = help_text(P);
        for cmd in ["add", "del", "list", "info"] {
            assert!(help.contains(&format!("$account {}", cmd)));
        }
    }
}
