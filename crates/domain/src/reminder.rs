use crate::delivery::DeliveryError;
use crate::retry::RetryPolicy;
use crate::shared::entity::{Entity, ID};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

/// Stored error texts are cut to this many characters
pub const MAX_ERROR_LEN: usize = 500;
/// Comment body used when the requester did not provide a message
pub const DEFAULT_REMINDER_MESSAGE: &str = "🔔 Reminder";
pub const INACTIVE_REPOSITORY_ERROR: &str = "Repository is inactive or deleted";

/// Lifecycle of a `Reminder`.
///
/// `Pending` and `Failed` reminders are picked up by the scheduler once they
/// are due, a worker holds a `Processing` reminder exclusively, and
/// `Sent` / `Dead` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Dead,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Dead => "dead",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Dead)
    }

    /// Statuses a due `Reminder` can be claimed from
    pub fn claimable() -> [ReminderStatus; 2] {
        [Self::Pending, Self::Failed]
    }
}

impl Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("Unknown reminder status: {0}")]
pub struct InvalidReminderStatus(String);

impl FromStr for ReminderStatus {
    type Err = InvalidReminderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "dead" => Ok(Self::Dead),
            other => Err(InvalidReminderStatus(other.to_string())),
        }
    }
}

/// A `Reminder` is a request to post a follow-up comment on an issue
/// at `scheduled_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: ID,
    /// The `Repository` owning the issue, e.g. `owner/name`
    pub repository_id: String,
    pub issue_number: i64,
    /// Comment body, `DEFAULT_REMINDER_MESSAGE` is used when absent
    pub message: Option<String>,
    pub status: ReminderStatus,
    /// When the next delivery attempt is due
    pub scheduled_at: i64,
    pub created_at: i64,
    /// Also set when the `Reminder` is claimed, so it doubles as the
    /// claim timestamp while `Processing`
    pub updated_at: i64,
    /// Only set when the `Reminder` is `Sent`
    pub sent_at: Option<i64>,
    pub last_retry_at: Option<i64>,
    /// Number of failed delivery attempts, never decreases
    pub retry_count: i32,
    /// Last delivery error, at most `MAX_ERROR_LEN` characters
    pub error: Option<String>,
    /// Identity of the user who requested the `Reminder`
    pub created_by: String,
}

/// What happened to a `Reminder` after a failed delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    Retry {
        retry_count: i32,
        next_attempt_at: i64,
        delay_min: i64,
    },
    Dead {
        retry_count: i32,
    },
}

impl Reminder {
    pub fn new(
        repository_id: String,
        issue_number: i64,
        message: Option<String>,
        scheduled_at: i64,
        created_by: String,
        now: i64,
    ) -> Self {
        let message = message.filter(|m| !m.trim().is_empty());
        Self {
            id: Default::default(),
            repository_id,
            issue_number,
            message,
            status: ReminderStatus::Pending,
            scheduled_at,
            created_at: now,
            updated_at: now,
            sent_at: None,
            last_retry_at: None,
            retry_count: 0,
            error: None,
            created_by,
        }
    }

    pub fn body(&self) -> &str {
        self.message.as_deref().unwrap_or(DEFAULT_REMINDER_MESSAGE)
    }

    /// Whether the scheduler should pick up this `Reminder` at `now`
    pub fn is_due(&self, now: i64, max_retries: i32) -> bool {
        ReminderStatus::claimable().contains(&self.status)
            && self.sent_at.is_none()
            && self.scheduled_at <= now
            && self.retry_count < max_retries
    }

    pub fn mark_sent(&mut self, now: i64) {
        self.status = ReminderStatus::Sent;
        self.sent_at = Some(now);
        self.updated_at = now;
    }

    /// Dead-letters the `Reminder` without counting it as a delivery attempt
    pub fn mark_dead(&mut self, reason: &str, now: i64) {
        self.status = ReminderStatus::Dead;
        self.error = Some(truncate_error(reason));
        self.updated_at = now;
    }

    /// Records a failed delivery attempt and either re-arms the `Reminder`
    /// for a later attempt or dead-letters it.
    pub fn record_failure(
        &mut self,
        err: &DeliveryError,
        policy: &RetryPolicy,
        now: i64,
    ) -> FailureOutcome {
        let previous_attempts = self.retry_count;
        self.retry_count += 1;
        self.error = Some(truncate_error(&err.to_string()));
        self.last_retry_at = Some(now);
        self.updated_at = now;

        let is_dead = policy.is_dead(self.retry_count, err.is_permanent());
        match policy.next_scheduled_at(now, previous_attempts, is_dead) {
            Some(next_attempt_at) => {
                self.status = ReminderStatus::Failed;
                self.scheduled_at = next_attempt_at;
                FailureOutcome::Retry {
                    retry_count: self.retry_count,
                    next_attempt_at,
                    delay_min: policy.next_delay(previous_attempts),
                }
            }
            None => {
                self.status = ReminderStatus::Dead;
                FailureOutcome::Dead {
                    retry_count: self.retry_count,
                }
            }
        }
    }
}

impl Entity for Reminder {
    fn id(&self) -> ID {
        self.id
    }
}

pub fn truncate_error(error: &str) -> String {
    error.chars().take(MAX_ERROR_LEN).collect()
}
