use crate::shared::entity::{Entity, ID};
use serde_json::Value;
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    ReminderSent,
    ReminderFailed,
    ReminderDead,
    DailyMetricsSent,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReminderSent => "REMINDER_SENT",
            Self::ReminderFailed => "REMINDER_FAILED",
            Self::ReminderDead => "REMINDER_DEAD",
            Self::DailyMetricsSent => "DAILY_METRICS_SENT",
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("Unknown audit action: {0}")]
pub struct InvalidAuditAction(String);

impl FromStr for AuditAction {
    type Err = InvalidAuditAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REMINDER_SENT" => Ok(Self::ReminderSent),
            "REMINDER_FAILED" => Ok(Self::ReminderFailed),
            "REMINDER_DEAD" => Ok(Self::ReminderDead),
            "DAILY_METRICS_SENT" => Ok(Self::DailyMetricsSent),
            other => Err(InvalidAuditAction(other.to_string())),
        }
    }
}

/// Append-only record of something that happened to a `Reminder` or
/// the scheduler. Entries are never updated or deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    pub id: ID,
    /// Set for entries concerning a single `Repository`
    pub repository_id: Option<String>,
    pub action: AuditAction,
    pub meta: Value,
    pub created_at: i64,
}

impl AuditLogEntry {
    pub fn new(repository_id: Option<String>, action: AuditAction, meta: Value, now: i64) -> Self {
        Self {
            id: Default::default(),
            repository_id,
            action,
            meta,
            created_at: now,
        }
    }
}

impl Entity for AuditLogEntry {
    fn id(&self) -> ID {
        self.id
    }
}
