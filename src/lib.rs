pub mod cli;
pub mod gerrit;
pub mod output;
pub mod parser;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Parameters for a single reviewer query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub project: String,
    pub reviewer: String,
    /// `None` leaves the login name to the ssh client.
    pub ssh_user: Option<String>,
    pub ssh_server: String,
    pub ssh_port: u16,
}

/// A Gerrit account as it appears in query output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl Account {
    /// Whether this account is the reviewer identified by `identifier`.
    ///
    /// Identifiers containing `@` are compared against the email address,
    /// anything else against the username.
    pub fn matches(&self, identifier: &str) -> bool {
        let field = if identifier.contains('@') {
            &self.email
        } else {
            &self.username
        };
        field.as_deref() == Some(identifier)
    }

    /// Best human-readable label for the account.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.email.as_deref())
            .unwrap_or("unknown")
    }
}

/// A single comment left by the reviewer on someone else's change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    pub change_id: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub reviewer: Account,
}

/// Totals gathered while printing a query response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuerySummary {
    pub changes: usize,
    pub comments: usize,
    pub skipped_lines: usize,
    pub more_changes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(username: &str, email: &str) -> Account {
        Account {
            name: None,
            email: Some(email.to_string()),
            username: Some(username.to_string()),
        }
    }

    #[test]
    fn matches_username_without_at_sign() {
        let acct = account("alice", "alice@example.com");
        assert!(acct.matches("alice"));
        assert!(!acct.matches("bob"));
    }

    #[test]
    fn matches_email_when_identifier_has_at_sign() {
        let acct = account("alice", "alice@example.com");
        assert!(acct.matches("alice@example.com"));
        assert!(!acct.matches("alice@example.org"));
    }

    #[test]
    fn account_without_field_never_matches() {
        assert!(!Account::default().matches("alice"));
        assert!(!Account::default().matches("alice@example.com"));
    }

    #[test]
    fn display_name_prefers_full_name() {
        let mut acct = account("alice", "alice@example.com");
        assert_eq!(acct.display_name(), "alice");
        acct.name = Some("Alice Liddell".to_string());
        assert_eq!(acct.display_name(), "Alice Liddell");
        assert_eq!(Account::default().display_name(), "unknown");
    }
}
