mod github;
mod telegram;

pub use github::GithubRestApi;
pub use telegram::{truncate_message, TelegramRestApi, MAX_MESSAGE_LEN};

use thiserror::Error;

/// Remaining request quota of the issue tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub remaining: i64,
    /// When the quota is restored, in millis
    pub reset_at: i64,
}

/// Short lived access token for one integration installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationToken {
    pub token: String,
    /// In millis
    pub expires_at: i64,
}

#[derive(Error, Debug)]
pub enum IssueTrackerError {
    #[error("Issue tracker responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Issue tracker request failed: {0}")]
    Transport(String),
    #[error("Issue tracker integration is not configured: {0}")]
    NotConfigured(String),
}

impl IssueTrackerError {
    /// The HTTP status code, when the issue tracker responded at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for IssueTrackerError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => Self::Transport(e.to_string()),
        }
    }
}

/// The hosting platform the reminders are delivered to
#[async_trait::async_trait]
pub trait IIssueTracker: Send + Sync {
    async fn create_issue_comment(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        issue_number: i64,
        body: &str,
    ) -> Result<(), IssueTrackerError>;

    async fn get_rate_limit_status(&self, token: &str)
        -> Result<RateLimitStatus, IssueTrackerError>;

    /// Exchanges the installation reference of a repository for an access token
    async fn issue_installation_credential(
        &self,
        installation_id: i64,
    ) -> Result<InstallationToken, IssueTrackerError>;
}

/// Chat channel operators receive status messages on
#[async_trait::async_trait]
pub trait INotifier: Send + Sync {
    async fn send_message(&self, text: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_status_code() {
        let err = IssueTrackerError::Status {
            status: 404,
            message: "Not Found".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(IssueTrackerError::Transport("reset".into()).status(), None);
        assert_eq!(IssueTrackerError::NotConfigured("app".into()).status(), None);
    }
}
