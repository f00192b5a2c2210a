use super::IAuditLogRepo;
use crate::repos::shared::inmemory_repo::*;
use nudge_domain::{AuditAction, AuditLogEntry};

pub struct InMemoryAuditLogRepo {
    entries: std::sync::Mutex<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLogRepo {
    pub fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IAuditLogRepo for InMemoryAuditLogRepo {
    async fn insert(&self, entry: &AuditLogEntry) -> anyhow::Result<()> {
        insert(entry, &self.entries);
        Ok(())
    }

    async fn find_since(
        &self,
        action: AuditAction,
        since: i64,
    ) -> anyhow::Result<Vec<AuditLogEntry>> {
        let mut entries = find_by(&self.entries, |e| e.action == action && e.created_at >= since);
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}
