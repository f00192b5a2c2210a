use super::IRepositoryRepo;
use nudge_domain::Repository;
use sqlx::{FromRow, PgPool};
use tracing::error;

pub struct PostgresRepositoryRepo {
    pool: PgPool,
}

impl PostgresRepositoryRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RepositoryRaw {
    repository_id: String,
    is_active: bool,
    installation_id: Option<i64>,
}

impl From<RepositoryRaw> for Repository {
    fn from(e: RepositoryRaw) -> Self {
        Self {
            id: e.repository_id,
            is_active: e.is_active,
            installation_id: e.installation_id,
        }
    }
}

#[async_trait::async_trait]
impl IRepositoryRepo for PostgresRepositoryRepo {
    async fn insert(&self, repository: &Repository) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO repositories(repository_id, is_active, installation_id)
            VALUES($1, $2, $3)
            "#,
        )
        .bind(&repository.id)
        .bind(repository.is_active)
        .bind(repository.installation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Unable to insert repository: {:?}. DB returned error: {:?}",
                repository, e
            );
            e
        })?;

        Ok(())
    }

    async fn save(&self, repository: &Repository) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE repositories SET
                is_active = $2,
                installation_id = $3
            WHERE repository_id = $1
            "#,
        )
        .bind(&repository.id)
        .bind(repository.is_active)
        .bind(repository.installation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Unable to save repository: {:?}. DB returned error: {:?}",
                repository, e
            );
            e
        })?;

        Ok(())
    }

    async fn find(&self, repository_id: &str) -> anyhow::Result<Option<Repository>> {
        let res: Option<RepositoryRaw> = sqlx::query_as(
            r#"
            SELECT * FROM repositories AS r
            WHERE r.repository_id = $1
            "#,
        )
        .bind(repository_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Find repository with id: {:?} failed. DB returned error: {:?}",
                repository_id, e
            );
            e
        })?;

        Ok(res.map(|repository| repository.into()))
    }
}
