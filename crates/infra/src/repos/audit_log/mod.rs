mod inmemory;
mod postgres;

pub use inmemory::InMemoryAuditLogRepo;
pub use postgres::PostgresAuditLogRepo;

use nudge_domain::{AuditAction, AuditLogEntry};

/// The audit log is append-only, entries are never updated or deleted
#[async_trait::async_trait]
pub trait IAuditLogRepo: Send + Sync {
    async fn insert(&self, entry: &AuditLogEntry) -> anyhow::Result<()>;
    /// Entries with the given action created at or after `since`, oldest first
    async fn find_since(&self, action: AuditAction, since: i64)
        -> anyhow::Result<Vec<AuditLogEntry>>;
}

#[cfg(test)]
mod tests {
    use crate::NudgeContext;
    use nudge_domain::{AuditAction, AuditLogEntry};
    use serde_json::json;

    #[tokio::test]
    async fn finds_entries_by_action_and_time() {
        let ctx = NudgeContext::create_inmemory();
        let old = AuditLogEntry::new(None, AuditAction::DailyMetricsSent, json!({}), 10);
        let new = AuditLogEntry::new(None, AuditAction::DailyMetricsSent, json!({}), 20);
        let other = AuditLogEntry::new(
            Some("octo/repo".into()),
            AuditAction::ReminderSent,
            json!({ "issueNumber": 1 }),
            30,
        );
        for entry in [&new, &old, &other] {
            assert!(ctx.repos.audit_logs.insert(entry).await.is_ok());
        }

        let found = ctx
            .repos
            .audit_logs
            .find_since(AuditAction::DailyMetricsSent, 0)
            .await
            .unwrap();
        assert_eq!(found, vec![old, new.clone()]);

        let found = ctx
            .repos
            .audit_logs
            .find_since(AuditAction::DailyMetricsSent, 15)
            .await
            .unwrap();
        assert_eq!(found, vec![new]);

        let found = ctx
            .repos
            .audit_logs
            .find_since(AuditAction::ReminderDead, 0)
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
