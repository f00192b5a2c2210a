use crate::{scheduler::Scheduler, shared::usecase::UseCase};
use nudge_domain::{start_of_utc_day, ReminderStatus};
use nudge_infra::{NudgeContext, ReminderCountQuery};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatusKind {
    /// Sent once when the scheduler process starts
    Startup,
    /// Sent on a fixed cadence while the scheduler runs
    Periodic,
}

/// Broadcasts the scheduler status to the notification channel
#[derive(Debug)]
pub struct SendChannelStatusUseCase {
    pub kind: ChannelStatusKind,
    pub scheduler: Arc<Scheduler>,
}

#[derive(Debug, thiserror::Error)]
pub enum UseCaseError {
    #[error("Unable to collect the scheduler status: {0}")]
    Storage(String),
}

impl SendChannelStatusUseCase {
    async fn message(&self, ctx: &NudgeContext) -> anyhow::Result<String> {
        match self.kind {
            ChannelStatusKind::Startup => Ok(format!(
                "🚀 *Reminder scheduler started*\n\nPolling every {}s, up to {} reminders per cycle",
                ctx.config.poll_interval.as_secs(),
                ctx.config.batch_size
            )),
            ChannelStatusKind::Periodic => {
                let now = ctx.sys.get_timestamp_millis();
                let reminders = &ctx.repos.reminders;
                let pending = reminders
                    .count(&ReminderCountQuery::all(ReminderStatus::Pending))
                    .await?;
                let sent_today = reminders
                    .count(&ReminderCountQuery::sent_since(start_of_utc_day(now)))
                    .await?;
                Ok(format!(
                    "🤖 *Reminder scheduler status*\n\nHealth: {}\n⏳ Pending: {}\n✅ Sent today: {}\n🔁 Processed since start: {}",
                    self.scheduler.state.status(),
                    pending,
                    sent_today,
                    self.scheduler.state.processed_total()
                ))
            }
        }
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for SendChannelStatusUseCase {
    /// Whether the notification channel accepted the message
    type Response = bool;

    type Error = UseCaseError;

    const NAME: &'static str = "SendChannelStatus";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        let message = self
            .message(ctx)
            .await
            .map_err(|e| UseCaseError::Storage(e.to_string()))?;

        Ok(self.scheduler.notifications.send_message(ctx, &message).await)
    }
}
