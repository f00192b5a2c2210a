use nudge_domain::ReminderStatus;

/// Selects `Reminder`s that are due for a delivery attempt
#[derive(Debug, Clone)]
pub struct DueRemindersQuery {
    /// Statuses a due `Reminder` may have
    pub statuses: Vec<ReminderStatus>,
    /// Only `Reminder`s scheduled at or before this timestamp
    pub scheduled_before: i64,
    /// Only `Reminder`s that have failed fewer times than this
    pub retry_count_below: i32,
    pub limit: i64,
}

/// Counts `Reminder`s in one status, optionally restricted to recent activity
#[derive(Debug, Clone)]
pub struct ReminderCountQuery {
    pub status: ReminderStatus,
    /// Only `Reminder`s updated at or after this timestamp
    pub updated_since: Option<i64>,
    /// Only `Reminder`s sent at or after this timestamp
    pub sent_since: Option<i64>,
}

impl ReminderCountQuery {
    pub fn all(status: ReminderStatus) -> Self {
        Self {
            status,
            updated_since: None,
            sent_since: None,
        }
    }

    pub fn updated_since(status: ReminderStatus, since: i64) -> Self {
        Self {
            status,
            updated_since: Some(since),
            sent_since: None,
        }
    }

    pub fn sent_since(since: i64) -> Self {
        Self {
            status: ReminderStatus::Sent,
            updated_since: None,
            sent_since: Some(since),
        }
    }
}
