use super::IRepositoryRepo;
use crate::repos::shared::inmemory_repo::*;
use nudge_domain::Repository;

pub struct InMemoryRepositoryRepo {
    repositories: std::sync::Mutex<Vec<Repository>>,
}

impl InMemoryRepositoryRepo {
    pub fn new() -> Self {
        Self {
            repositories: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IRepositoryRepo for InMemoryRepositoryRepo {
    async fn insert(&self, repository: &Repository) -> anyhow::Result<()> {
        insert(repository, &self.repositories);
        Ok(())
    }

    async fn save(&self, repository: &Repository) -> anyhow::Result<()> {
        if !save(repository, &self.repositories) {
            anyhow::bail!("Repository {} does not exist", repository.id);
        }
        Ok(())
    }

    async fn find(&self, repository_id: &str) -> anyhow::Result<Option<Repository>> {
        Ok(find(&repository_id.to_string(), &self.repositories))
    }
}
