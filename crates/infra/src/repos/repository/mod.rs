mod inmemory;
mod postgres;

pub use inmemory::InMemoryRepositoryRepo;
pub use postgres::PostgresRepositoryRepo;

use nudge_domain::Repository;

#[async_trait::async_trait]
pub trait IRepositoryRepo: Send + Sync {
    async fn insert(&self, repository: &Repository) -> anyhow::Result<()>;
    async fn save(&self, repository: &Repository) -> anyhow::Result<()>;
    /// `Ok(None)` when no `Repository` with the id exists
    async fn find(&self, repository_id: &str) -> anyhow::Result<Option<Repository>>;
}
