use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("Account {0} does not exist")]
    NotFound(String),
}

impl AccountError {
    /// Text shown to an administrator when a command fails.
    ///
    /// Validation and not-found errors are the admin's own doing and are
    /// reported verbatim. Anything else is reported generically; the
    /// details go to the log.
    pub fn user_message(&self) -> String {
        match self {
            AccountError::Validation(msg) => msg.clone(),
            AccountError::NotFound(_) => self.to_string(),
            _ => "Command failed, see server log for details".to_string(),
        }
    }

    /// Whether the error came from the storage layer.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AccountError::Database(_) | AccountError::Storage(_) | AccountError::Io(_)
        )
    }
}

impl From<config::ConfigError> for AccountError {
    fn from(e: config::ConfigError) -> Self {
        AccountError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_storage_details() {
        let err = AccountError::Storage("disk I/O error at page 12".to_string());
        assert!(err.is_storage());
        assert!(!err.user_message().contains("page 12"));
    }

    #[test]
    fn test_user_message_keeps_validation_text() {
        let err = AccountError::Validation("Usage: $account del <identity>".to_string());
        assert_eq!(err.user_message(), "Usage: $account del <identity>");
        assert!(!err.is_storage());
    }

    #[test]
    fn test_not_found_message_names_identity() {
        let err = AccountError::NotFound("wxid_42".to_string());
        assert_eq!(err.user_message(), "Account wxid_42 does not exist");
    }
}
