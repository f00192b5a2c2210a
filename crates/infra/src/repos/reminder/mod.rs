mod inmemory;
mod postgres;

pub use inmemory::InMemoryReminderRepo;
pub use postgres::PostgresReminderRepo;

use crate::repos::shared::query_structs::{DueRemindersQuery, ReminderCountQuery};
use nudge_domain::{Reminder, ReminderStatus, ID};

#[async_trait::async_trait]
pub trait IReminderRepo: Send + Sync {
    async fn insert(&self, reminder: &Reminder) -> anyhow::Result<()>;
    async fn save(&self, reminder: &Reminder) -> anyhow::Result<()>;
    /// Saves the `Reminder` only while it is still `Processing` under the
    /// claim taken at `claimed_at`. Returns `false` when the claim was
    /// released or taken over by another worker in the meantime.
    async fn save_claimed(&self, reminder: &Reminder, claimed_at: i64) -> anyhow::Result<bool>;
    async fn find(&self, reminder_id: &ID) -> Option<Reminder>;
    /// Due `Reminder`s, oldest `scheduled_at` first
    async fn find_due(&self, query: &DueRemindersQuery) -> anyhow::Result<Vec<Reminder>>;
    /// Moves the `Reminder` from `expected` to `Processing` in one atomic
    /// conditional write. Returns `false` when the `Reminder` was not in the
    /// `expected` status anymore, e.g. because another worker claimed it.
    async fn claim(&self, reminder_id: &ID, expected: ReminderStatus, now: i64)
        -> anyhow::Result<bool>;
    /// Moves `Processing` reminders claimed before `claimed_before` back
    /// to `Pending`. Returns the number of released reminders.
    async fn release_stale(&self, claimed_before: i64, now: i64) -> anyhow::Result<u64>;
    async fn count(&self, query: &ReminderCountQuery) -> anyhow::Result<i64>;
    /// Whether the user already requested a `Reminder` on the issue since `since`
    async fn exists_recent(
        &self,
        repository_id: &str,
        issue_number: i64,
        created_by: &str,
        since: i64,
    ) -> anyhow::Result<bool>;
}
