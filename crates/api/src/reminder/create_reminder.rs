use crate::shared::usecase::UseCase;
use nudge_domain::Reminder;
use nudge_infra::NudgeContext;

/// Persists a new `Reminder` requested by a user on an issue
#[derive(Debug)]
pub struct CreateReminderUseCase {
    pub repository_id: String,
    pub issue_number: i64,
    pub message: Option<String>,
    pub scheduled_at: i64,
    pub created_by: String,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum UseCaseError {
    #[error("The reminder time {0} is not in the future")]
    InvalidSchedule(i64),
    #[error("The repository {0} was not found or is inactive")]
    RepositoryNotFound(String),
    /// The user already asked for a reminder on this issue very recently
    #[error("A reminder was already requested for this issue")]
    TooManyRequests,
    #[error("Unable to store the reminder")]
    Storage,
}

#[async_trait::async_trait(?Send)]
impl UseCase for CreateReminderUseCase {
    type Response = Reminder;

    type Error = UseCaseError;

    const NAME: &'static str = "CreateReminder";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        let now = ctx.sys.get_timestamp_millis();
        if self.scheduled_at <= now {
            return Err(UseCaseError::InvalidSchedule(self.scheduled_at));
        }

        let repository = ctx
            .repos
            .repositories
            .find(&self.repository_id)
            .await
            .map_err(|_| UseCaseError::Storage)?;
        match repository {
            Some(repository) if repository.is_active => (),
            _ => return Err(UseCaseError::RepositoryNotFound(self.repository_id.clone())),
        }

        let recent_window = ctx.config.reminder_recent_window.as_millis() as i64;
        let is_duplicate = ctx
            .repos
            .reminders
            .exists_recent(
                &self.repository_id,
                self.issue_number,
                &self.created_by,
                now - recent_window,
            )
            .await
            .map_err(|_| UseCaseError::Storage)?;
        if is_duplicate {
            return Err(UseCaseError::TooManyRequests);
        }

        let reminder = Reminder::new(
            self.repository_id.clone(),
            self.issue_number,
            self.message.take(),
            self.scheduled_at,
            self.created_by.clone(),
            now,
        );
        ctx.repos
            .reminders
            .insert(&reminder)
            .await
            .map_err(|_| UseCaseError::Storage)?;

        Ok(reminder)
    }
}
