use super::IReminderRepo;
use crate::repos::shared::query_structs::{DueRemindersQuery, ReminderCountQuery};
use nudge_domain::{Reminder, ReminderStatus, ID};
use sqlx::{types::Uuid, FromRow, PgPool};
use tracing::error;

pub struct PostgresReminderRepo {
    pool: PgPool,
}

impl PostgresReminderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ReminderRaw {
    reminder_uid: Uuid,
    repository_id: String,
    issue_number: i64,
    message: Option<String>,
    status: String,
    scheduled_at: i64,
    created_at: i64,
    updated_at: i64,
    sent_at: Option<i64>,
    last_retry_at: Option<i64>,
    retry_count: i32,
    error: Option<String>,
    created_by: String,
}

impl TryFrom<ReminderRaw> for Reminder {
    type Error = anyhow::Error;

    fn try_from(e: ReminderRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: e.reminder_uid.into(),
            repository_id: e.repository_id,
            issue_number: e.issue_number,
            message: e.message,
            status: e.status.parse()?,
            scheduled_at: e.scheduled_at,
            created_at: e.created_at,
            updated_at: e.updated_at,
            sent_at: e.sent_at,
            last_retry_at: e.last_retry_at,
            retry_count: e.retry_count,
            error: e.error,
            created_by: e.created_by,
        })
    }
}

fn into_reminders(raws: Vec<ReminderRaw>) -> anyhow::Result<Vec<Reminder>> {
    raws.into_iter().map(Reminder::try_from).collect()
}

#[async_trait::async_trait]
impl IReminderRepo for PostgresReminderRepo {
    async fn insert(&self, reminder: &Reminder) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reminders(
                reminder_uid, repository_id, issue_number, message, status,
                scheduled_at, created_at, updated_at, sent_at, last_retry_at,
                retry_count, error, created_by
            )
            VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(reminder.id.inner_ref())
        .bind(&reminder.repository_id)
        .bind(reminder.issue_number)
        .bind(&reminder.message)
        .bind(reminder.status.as_str())
        .bind(reminder.scheduled_at)
        .bind(reminder.created_at)
        .bind(reminder.updated_at)
        .bind(reminder.sent_at)
        .bind(reminder.last_retry_at)
        .bind(reminder.retry_count)
        .bind(&reminder.error)
        .bind(&reminder.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Unable to insert reminder: {:?}. DB returned error: {:?}",
                reminder, e
            );
            e
        })?;

        Ok(())
    }

    async fn save(&self, reminder: &Reminder) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE reminders SET
                message = $2,
                status = $3,
                scheduled_at = $4,
                updated_at = $5,
                sent_at = $6,
                last_retry_at = $7,
                retry_count = $8,
                error = $9
            WHERE reminder_uid = $1
            "#,
        )
        .bind(reminder.id.inner_ref())
        .bind(&reminder.message)
        .bind(reminder.status.as_str())
        .bind(reminder.scheduled_at)
        .bind(reminder.updated_at)
        .bind(reminder.sent_at)
        .bind(reminder.last_retry_at)
        .bind(reminder.retry_count)
        .bind(&reminder.error)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Unable to save reminder: {:?}. DB returned error: {:?}",
                reminder, e
            );
            e
        })?;

        Ok(())
    }

    async fn save_claimed(&self, reminder: &Reminder, claimed_at: i64) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE reminders SET
                message = $2,
                status = $3,
                scheduled_at = $4,
                updated_at = $5,
                sent_at = $6,
                last_retry_at = $7,
                retry_count = $8,
                error = $9
            WHERE reminder_uid = $1 AND status = $10 AND updated_at = $11
            "#,
        )
        .bind(reminder.id.inner_ref())
        .bind(&reminder.message)
        .bind(reminder.status.as_str())
        .bind(reminder.scheduled_at)
        .bind(reminder.updated_at)
        .bind(reminder.sent_at)
        .bind(reminder.last_retry_at)
        .bind(reminder.retry_count)
        .bind(&reminder.error)
        .bind(ReminderStatus::Processing.as_str())
        .bind(claimed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Unable to save claimed reminder: {:?}. DB returned error: {:?}",
                reminder, e
            );
            e
        })?;

        Ok(res.rows_affected() == 1)
    }

    async fn find(&self, reminder_id: &ID) -> Option<Reminder> {
        let res: Option<ReminderRaw> = sqlx::query_as(
            r#"
            SELECT * FROM reminders AS r
            WHERE r.reminder_uid = $1
            "#,
        )
        .bind(reminder_id.inner_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Find reminder with id: {:?} failed. DB returned error: {:?}",
                reminder_id, e
            );
            e
        })
        .ok()?;

        res.and_then(|raw| {
            Reminder::try_from(raw)
                .map_err(|e| error!("Stored reminder {:?} is invalid: {:?}", reminder_id, e))
                .ok()
        })
    }

    async fn find_due(&self, query: &DueRemindersQuery) -> anyhow::Result<Vec<Reminder>> {
        let statuses = query
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect::<Vec<_>>();
        let reminders: Vec<ReminderRaw> = sqlx::query_as(
            r#"
            SELECT * FROM reminders AS r
            WHERE r.status = ANY($1)
                AND r.sent_at IS NULL
                AND r.scheduled_at <= $2
                AND r.retry_count < $3
            ORDER BY r.scheduled_at ASC
            LIMIT $4
            "#,
        )
        .bind(&statuses)
        .bind(query.scheduled_before)
        .bind(query.retry_count_below)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Find due reminders: {:?} failed. DB returned error: {:?}",
                query, e
            );
            e
        })?;

        into_reminders(reminders)
    }

    async fn claim(
        &self,
        reminder_id: &ID,
        expected: ReminderStatus,
        now: i64,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE reminders SET
                status = $3,
                updated_at = $4
            WHERE reminder_uid = $1 AND status = $2
            "#,
        )
        .bind(reminder_id.inner_ref())
        .bind(expected.as_str())
        .bind(ReminderStatus::Processing.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Claim reminder with id: {:?} failed. DB returned error: {:?}",
                reminder_id, e
            );
            e
        })?;

        Ok(res.rows_affected() == 1)
    }

    async fn release_stale(&self, claimed_before: i64, now: i64) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE reminders SET
                status = $1,
                updated_at = $4
            WHERE status = $2 AND updated_at < $3
            "#,
        )
        .bind(ReminderStatus::Pending.as_str())
        .bind(ReminderStatus::Processing.as_str())
        .bind(claimed_before)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Release of reminders claimed before {} failed. DB returned error: {:?}",
                claimed_before, e
            );
            e
        })?;

        Ok(res.rows_affected())
    }

    async fn count(&self, query: &ReminderCountQuery) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM reminders AS r
            WHERE r.status = $1
                AND ($2::BIGINT IS NULL OR r.updated_at >= $2)
                AND ($3::BIGINT IS NULL OR r.sent_at >= $3)
            "#,
        )
        .bind(query.status.as_str())
        .bind(query.updated_since)
        .bind(query.sent_since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Count reminders: {:?} failed. DB returned error: {:?}",
                query, e
            );
            e
        })?;

        Ok(count)
    }

    async fn exists_recent(
        &self,
        repository_id: &str,
        issue_number: i64,
        created_by: &str,
        since: i64,
    ) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reminders AS r
                WHERE r.repository_id = $1
                    AND r.issue_number = $2
                    AND r.created_by = $3
                    AND r.created_at >= $4
            )
            "#,
        )
        .bind(repository_id)
        .bind(issue_number)
        .bind(created_by)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Lookup of recent reminders on {}#{} failed. DB returned error: {:?}",
                repository_id, issue_number, e
            );
            e
        })?;

        Ok(exists)
    }
}
