use super::IReminderRepo;
use crate::repos::shared::{
    inmemory_repo::*,
    query_structs::{DueRemindersQuery, ReminderCountQuery},
};
use nudge_domain::{Reminder, ReminderStatus, ID};

pub struct InMemoryReminderRepo {
    reminders: std::sync::Mutex<Vec<Reminder>>,
}

impl InMemoryReminderRepo {
    pub fn new() -> Self {
        Self {
            reminders: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IReminderRepo for InMemoryReminderRepo {
    async fn insert(&self, reminder: &Reminder) -> anyhow::Result<()> {
        insert(reminder, &self.reminders);
        Ok(())
    }

    async fn save(&self, reminder: &Reminder) -> anyhow::Result<()> {
        if !save(reminder, &self.reminders) {
            anyhow::bail!("Reminder {} does not exist", reminder.id);
        }
        Ok(())
    }

    async fn save_claimed(&self, reminder: &Reminder, claimed_at: i64) -> anyhow::Result<bool> {
        let updated = update_many(
            &self.reminders,
            |r| {
                r.id == reminder.id
                    && r.status == ReminderStatus::Processing
                    && r.updated_at == claimed_at
            },
            |r| *r = reminder.clone(),
        );
        Ok(updated == 1)
    }

    async fn find(&self, reminder_id: &ID) -> Option<Reminder> {
        find(reminder_id, &self.reminders)
    }

    async fn find_due(&self, query: &DueRemindersQuery) -> anyhow::Result<Vec<Reminder>> {
        let mut due = find_by(&self.reminders, |r| {
            query.statuses.contains(&r.status)
                && r.sent_at.is_none()
                && r.scheduled_at <= query.scheduled_before
                && r.retry_count < query.retry_count_below
        });
        due.sort_by_key(|r| r.scheduled_at);
        due.truncate(usize::try_from(query.limit).unwrap_or(0));
        Ok(due)
    }

    async fn claim(
        &self,
        reminder_id: &ID,
        expected: ReminderStatus,
        now: i64,
    ) -> anyhow::Result<bool> {
        let updated = update_many(
            &self.reminders,
            |r| r.id == *reminder_id && r.status == expected,
            |r| {
                r.status = ReminderStatus::Processing;
                r.updated_at = now;
            },
        );
        Ok(updated == 1)
    }

    async fn release_stale(&self, claimed_before: i64, now: i64) -> anyhow::Result<u64> {
        Ok(update_many(
            &self.reminders,
            |r| r.status == ReminderStatus::Processing && r.updated_at < claimed_before,
            |r| {
                r.status = ReminderStatus::Pending;
                r.updated_at = now;
            },
        ))
    }

    async fn count(&self, query: &ReminderCountQuery) -> anyhow::Result<i64> {
        Ok(count_by(&self.reminders, |r| {
            r.status == query.status
                && query.updated_since.map_or(true, |since| r.updated_at >= since)
                && query
                    .sent_since
                    .map_or(true, |since| r.sent_at.map_or(false, |sent_at| sent_at >= since))
        }))
    }

    async fn exists_recent(
        &self,
        repository_id: &str,
        issue_number: i64,
        created_by: &str,
        since: i64,
    ) -> anyhow::Result<bool> {
        Ok(count_by(&self.reminders, |r| {
            r.repository_id == repository_id
                && r.issue_number == issue_number
                && r.created_by == created_by
                && r.created_at >= since
        }) > 0)
    }
}
