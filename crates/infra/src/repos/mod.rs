mod audit_log;
mod reminder;
mod repository;
mod shared;

use audit_log::{InMemoryAuditLogRepo, PostgresAuditLogRepo};
use reminder::{InMemoryReminderRepo, PostgresReminderRepo};
use repository::{InMemoryRepositoryRepo, PostgresRepositoryRepo};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

pub use audit_log::IAuditLogRepo;
pub use reminder::IReminderRepo;
pub use repository::IRepositoryRepo;
pub use shared::query_structs::*;

#[derive(Clone)]
pub struct Repos {
    pub reminders: Arc<dyn IReminderRepo>,
    pub repositories: Arc<dyn IRepositoryRepo>,
    pub audit_logs: Arc<dyn IAuditLogRepo>,
}

impl Repos {
    pub async fn create_postgres(connection_string: &str) -> anyhow::Result<Self> {
        info!("DB CHECKING CONNECTION ...");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;
        info!("DB CHECKING CONNECTION ... [done]");

        Ok(Self {
            reminders: Arc::new(PostgresReminderRepo::new(pool.clone())),
            repositories: Arc::new(PostgresRepositoryRepo::new(pool.clone())),
            audit_logs: Arc::new(PostgresAuditLogRepo::new(pool)),
        })
    }

    pub fn create_inmemory() -> Self {
        Self {
            reminders: Arc::new(InMemoryReminderRepo::new()),
            repositories: Arc::new(InMemoryRepositoryRepo::new()),
            audit_logs: Arc::new(InMemoryAuditLogRepo::new()),
        }
    }
}
