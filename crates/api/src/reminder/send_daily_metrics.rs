use crate::{scheduler::Scheduler, shared::usecase::UseCase};
use nudge_domain::{start_of_utc_day, utc_date, AuditAction, AuditLogEntry, DailyMetrics, ReminderStatus};
use nudge_infra::{NudgeContext, ReminderCountQuery};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Sends the daily reminder metrics to the notification channel, at most
/// once per UTC day. Cheap to call on every scheduler cycle.
#[derive(Debug)]
pub struct SendDailyMetricsUseCase {
    pub scheduler: Arc<Scheduler>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UseCaseResponse {
    AlreadySent,
    Sent {
        metrics: DailyMetrics,
        /// Whether the notification channel accepted the summary
        delivered: bool,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum UseCaseError {
    #[error("Unable to collect or record the daily metrics: {0}")]
    Storage(String),
}

async fn collect_daily_metrics(
    ctx: &NudgeContext,
    start_of_day: i64,
) -> anyhow::Result<DailyMetrics> {
    let reminders = &ctx.repos.reminders;
    Ok(DailyMetrics {
        sent: reminders
            .count(&ReminderCountQuery::sent_since(start_of_day))
            .await?,
        failed: reminders
            .count(&ReminderCountQuery::updated_since(
                ReminderStatus::Failed,
                start_of_day,
            ))
            .await?,
        dead: reminders
            .count(&ReminderCountQuery::updated_since(
                ReminderStatus::Dead,
                start_of_day,
            ))
            .await?,
        pending: reminders
            .count(&ReminderCountQuery::all(ReminderStatus::Pending))
            .await?,
    })
}

#[async_trait::async_trait(?Send)]
impl UseCase for SendDailyMetricsUseCase {
    type Response = UseCaseResponse;

    type Error = UseCaseError;

    const NAME: &'static str = "SendDailyMetrics";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        let now = ctx.sys.get_timestamp_millis();
        let start_of_day = start_of_utc_day(now);

        let sent_today = ctx
            .repos
            .audit_logs
            .find_since(AuditAction::DailyMetricsSent, start_of_day)
            .await
            .map_err(|e| UseCaseError::Storage(e.to_string()))?;
        if !sent_today.is_empty() {
            return Ok(UseCaseResponse::AlreadySent);
        }

        let metrics = collect_daily_metrics(ctx, start_of_day)
            .await
            .map_err(|e| UseCaseError::Storage(e.to_string()))?;
        let delivered = self
            .scheduler
            .notifications
            .send_message(ctx, &metrics.summary())
            .await;

        let entry = AuditLogEntry::new(
            None,
            AuditAction::DailyMetricsSent,
            json!({
                "date": utc_date(now),
                "sent": metrics.sent,
                "failed": metrics.failed,
                "dead": metrics.dead,
                "pending": metrics.pending,
            }),
            now,
        );
        ctx.repos
            .audit_logs
            .insert(&entry)
            .await
            .map_err(|e| UseCaseError::Storage(e.to_string()))?;

        info!("Daily metrics for {}: {:?}", utc_date(now), metrics);
        Ok(UseCaseResponse::Sent { metrics, delivered })
    }
}
