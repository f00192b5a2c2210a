use super::IAuditLogRepo;
use nudge_domain::{AuditAction, AuditLogEntry};
use serde_json::Value;
use sqlx::{
    types::{Json, Uuid},
    FromRow, PgPool,
};
use tracing::error;

pub struct PostgresAuditLogRepo {
    pool: PgPool,
}

impl PostgresAuditLogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRaw {
    audit_log_uid: Uuid,
    repository_id: Option<String>,
    action: String,
    meta: Value,
    created_at: i64,
}

impl TryFrom<AuditLogRaw> for AuditLogEntry {
    type Error = anyhow::Error;

    fn try_from(e: AuditLogRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: e.audit_log_uid.into(),
            repository_id: e.repository_id,
            action: e.action.parse()?,
            meta: e.meta,
            created_at: e.created_at,
        })
    }
}

#[async_trait::async_trait]
impl IAuditLogRepo for PostgresAuditLogRepo {
    async fn insert(&self, entry: &AuditLogEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs(audit_log_uid, repository_id, action, meta, created_at)
            VALUES($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id.inner_ref())
        .bind(&entry.repository_id)
        .bind(entry.action.as_str())
        .bind(Json(&entry.meta))
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Unable to insert audit log entry: {:?}. DB returned error: {:?}",
                entry, e
            );
            e
        })?;

        Ok(())
    }

    async fn find_since(
        &self,
        action: AuditAction,
        since: i64,
    ) -> anyhow::Result<Vec<AuditLogEntry>> {
        let entries: Vec<AuditLogRaw> = sqlx::query_as(
            r#"
            SELECT * FROM audit_logs AS a
            WHERE a.action = $1 AND a.created_at >= $2
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(action.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Find audit log entries {} since {} failed. DB returned error: {:?}",
                action, since, e
            );
            e
        })?;

        entries.into_iter().map(AuditLogEntry::try_from).collect()
    }
}
