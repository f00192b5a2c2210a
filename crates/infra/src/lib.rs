mod config;
mod repos;
mod services;
mod system;

pub use config::{Config, GithubAppConfig, GithubConfig, TelegramConfig};
pub use repos::{
    DueRemindersQuery, IAuditLogRepo, IReminderRepo, IRepositoryRepo, ReminderCountQuery, Repos,
};
pub use services::*;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
pub use system::{ISys, ManualSys, RealSys};

/// External collaborators of the scheduler
#[derive(Clone)]
pub struct Services {
    pub issue_tracker: Arc<dyn IIssueTracker>,
    /// `None` when no notification channel is configured
    pub notifier: Option<Arc<dyn INotifier>>,
}

impl Services {
    fn create(config: &Config, sys: Arc<dyn ISys>) -> Self {
        Self {
            issue_tracker: Arc::new(GithubRestApi::new(config.github.clone(), sys)),
            notifier: config
                .telegram
                .clone()
                .map(|telegram| Arc::new(TelegramRestApi::new(telegram)) as Arc<dyn INotifier>),
        }
    }
}

#[derive(Clone)]
pub struct NudgeContext {
    pub repos: Repos,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
    pub services: Services,
}

struct ContextParams {
    pub postgres_connection_string: String,
}

impl NudgeContext {
    async fn create(params: ContextParams) -> anyhow::Result<Self> {
        let repos = Repos::create_postgres(&params.postgres_connection_string).await?;
        let config = Config::new();
        let sys: Arc<dyn ISys> = Arc::new(RealSys {});
        Ok(Self {
            repos,
            services: Services::create(&config, sys.clone()),
            config,
            sys,
        })
    }

    /// Context without a database, used by tests
    pub fn create_inmemory() -> Self {
        let config = Config::new();
        let sys: Arc<dyn ISys> = Arc::new(RealSys {});
        Self {
            repos: Repos::create_inmemory(),
            services: Services::create(&config, sys.clone()),
            config,
            sys,
        }
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> anyhow::Result<NudgeContext> {
    NudgeContext::create(ContextParams {
        postgres_connection_string: get_psql_connection_string()?,
    })
    .await
}

fn get_psql_connection_string() -> anyhow::Result<String> {
    const PSQL_CONNECTION_STRING: &str = "DATABASE_URL";

    std::env::var(PSQL_CONNECTION_STRING)
        .map_err(|_| anyhow::anyhow!("{} env var to be present.", PSQL_CONNECTION_STRING))
}

pub async fn run_migration() -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&get_psql_connection_string()?)
        .await?;

    sqlx::migrate!().run(&pool).await?;
    Ok(())
}
