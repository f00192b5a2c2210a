use crate::shared::usecase::UseCase;
use nudge_infra::NudgeContext;
use tracing::info;

/// Releases reminders left in `Processing` by a worker that crashed or was
/// killed before recording an outcome
#[derive(Debug)]
pub struct CleanupStaleLocksUseCase {}

#[derive(Debug, thiserror::Error)]
pub enum UseCaseError {
    #[error("Unable to release stale reminder locks: {0}")]
    Storage(String),
}

#[async_trait::async_trait(?Send)]
impl UseCase for CleanupStaleLocksUseCase {
    /// Number of released reminders
    type Response = u64;

    type Error = UseCaseError;

    const NAME: &'static str = "CleanupStaleLocks";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        let now = ctx.sys.get_timestamp_millis();
        let timeout = ctx.config.processing_timeout.as_millis() as i64;

        let released = ctx
            .repos
            .reminders
            .release_stale(now - timeout, now)
            .await
            .map_err(|e| UseCaseError::Storage(e.to_string()))?;
        if released > 0 {
            info!("Released {} stale reminder locks", released);
        }
        Ok(released)
    }
}
