use crate::{scheduler::Scheduler, shared::usecase::UseCase};
use nudge_domain::{
    AuditAction, AuditLogEntry, DeliveryError, FailureOutcome, Reminder, ReminderStatus,
    INACTIVE_REPOSITORY_ERROR,
};
use nudge_infra::NudgeContext;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Takes one due `Reminder` through a delivery attempt:
/// claim, validate the `Repository`, deliver and record the outcome.
#[derive(Debug)]
pub struct ProcessReminderUseCase {
    pub reminder: Reminder,
    pub scheduler: Arc<Scheduler>,
}

/// Timestamp of the claim held by this worker
type ClaimedAt = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Another worker claimed the `Reminder` first
    Skipped,
    /// The claim was released by the stale-lock reaper before the outcome
    /// could be written, the outcome was dropped
    ClaimLost,
    Sent,
    Retrying {
        retry_count: i32,
        next_attempt_at: i64,
    },
    Dead {
        retry_count: i32,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum UseCaseError {
    #[error("Unable to update the reminder: {0}")]
    Storage(String),
}

#[async_trait::async_trait(?Send)]
impl UseCase for ProcessReminderUseCase {
    type Response = ProcessOutcome;

    type Error = UseCaseError;

    const NAME: &'static str = "ProcessReminder";

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error> {
        let scheduler = self.scheduler.clone();
        let _in_flight = scheduler.state.begin_processing();

        let now = ctx.sys.get_timestamp_millis();
        let claimed = ctx
            .repos
            .reminders
            .claim(&self.reminder.id, self.reminder.status, now)
            .await
            .map_err(|e| UseCaseError::Storage(e.to_string()))?;
        if !claimed {
            debug!("Reminder {} already locked", self.reminder.id);
            return Ok(ProcessOutcome::Skipped);
        }
        self.reminder.status = ReminderStatus::Processing;
        self.reminder.updated_at = now;
        let claimed_at: ClaimedAt = now;

        // A storage error keeps the claim, the reaper makes the reminder due again
        let repository = ctx
            .repos
            .repositories
            .find(&self.reminder.repository_id)
            .await
            .map_err(|e| UseCaseError::Storage(e.to_string()))?;
        if !repository.map(|r| r.is_active).unwrap_or(false) {
            return self.mark_inactive(ctx, claimed_at).await;
        }

        let res = scheduler
            .delivery
            .post_comment(
                ctx,
                &self.reminder.repository_id,
                self.reminder.issue_number,
                self.reminder.body(),
            )
            .await;

        match res {
            Ok(()) => self.mark_sent(ctx, claimed_at).await,
            Err(e) => self.handle_failure(ctx, claimed_at, e).await,
        }
    }
}

impl ProcessReminderUseCase {
    /// Writes the outcome if this worker still holds the claim.
    /// Returns `false` when the outcome was dropped.
    async fn save(
        &self,
        ctx: &NudgeContext,
        claimed_at: ClaimedAt,
    ) -> Result<bool, UseCaseError> {
        let saved = ctx
            .repos
            .reminders
            .save_claimed(&self.reminder, claimed_at)
            .await
            .map_err(|e| UseCaseError::Storage(e.to_string()))?;
        if !saved {
            warn!(
                "Claim on reminder {} was released before its outcome {:?} was saved, dropping it",
                self.reminder.id, self.reminder.status
            );
        }
        Ok(saved)
    }

    /// The audit log is best effort, a failed write never fails the delivery
    async fn audit(&self, ctx: &NudgeContext, action: AuditAction, meta: Value) {
        let entry = AuditLogEntry::new(
            Some(self.reminder.repository_id.clone()),
            action,
            meta,
            ctx.sys.get_timestamp_millis(),
        );
        if let Err(e) = ctx.repos.audit_logs.insert(&entry).await {
            error!("Unable to write audit log entry {:?}. Error: {:?}", entry, e);
        }
    }

    async fn mark_inactive(
        &mut self,
        ctx: &NudgeContext,
        claimed_at: ClaimedAt,
    ) -> Result<ProcessOutcome, UseCaseError> {
        self.reminder
            .mark_dead(INACTIVE_REPOSITORY_ERROR, ctx.sys.get_timestamp_millis());
        if !self.save(ctx, claimed_at).await? {
            return Ok(ProcessOutcome::ClaimLost);
        }
        self.audit(
            ctx,
            AuditAction::ReminderDead,
            json!({
                "reminderId": self.reminder.id.to_string(),
                "issueNumber": self.reminder.issue_number,
                "retry": self.reminder.retry_count,
                "error": INACTIVE_REPOSITORY_ERROR,
                "nextRetryIn": Value::Null,
            }),
        )
        .await;

        warn!(
            "Reminder {} is dead: {}",
            self.reminder.id, INACTIVE_REPOSITORY_ERROR
        );
        Ok(ProcessOutcome::Dead {
            retry_count: self.reminder.retry_count,
        })
    }

    async fn mark_sent(
        &mut self,
        ctx: &NudgeContext,
        claimed_at: ClaimedAt,
    ) -> Result<ProcessOutcome, UseCaseError> {
        self.reminder.mark_sent(ctx.sys.get_timestamp_millis());
        if !self.save(ctx, claimed_at).await? {
            return Ok(ProcessOutcome::ClaimLost);
        }
        self.audit(
            ctx,
            AuditAction::ReminderSent,
            json!({
                "reminderId": self.reminder.id.to_string(),
                "issueNumber": self.reminder.issue_number,
            }),
        )
        .await;

        info!("Reminder {} sent", self.reminder.id);
        Ok(ProcessOutcome::Sent)
    }

    async fn handle_failure(
        &mut self,
        ctx: &NudgeContext,
        claimed_at: ClaimedAt,
        err: DeliveryError,
    ) -> Result<ProcessOutcome, UseCaseError> {
        let outcome = self.reminder.record_failure(
            &err,
            &ctx.config.retry_policy,
            ctx.sys.get_timestamp_millis(),
        );
        if !self.save(ctx, claimed_at).await? {
            return Ok(ProcessOutcome::ClaimLost);
        }

        let (action, next_retry_in, res) = match outcome {
            FailureOutcome::Retry {
                retry_count,
                next_attempt_at,
                delay_min,
            } => (
                AuditAction::ReminderFailed,
                Value::String(format!("{} minutes", delay_min)),
                ProcessOutcome::Retrying {
                    retry_count,
                    next_attempt_at,
                },
            ),
            FailureOutcome::Dead { retry_count } => (
                AuditAction::ReminderDead,
                Value::Null,
                ProcessOutcome::Dead { retry_count },
            ),
        };
        self.audit(
            ctx,
            action,
            json!({
                "reminderId": self.reminder.id.to_string(),
                "issueNumber": self.reminder.issue_number,
                "retry": self.reminder.retry_count,
                "error": self.reminder.error,
                "nextRetryIn": next_retry_in,
            }),
        )
        .await;

        warn!(
            "Reminder {} failed, retry={}, outcome={:?}. Error: {}",
            self.reminder.id, self.reminder.retry_count, res, err
        );
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        reminder::cleanup_stale_locks::CleanupStaleLocksUseCase,
        shared::fakes::{TestEnv, UnreachableRepositoryRepo, NOW},
    };
    use nudge_domain::Repository;
    use nudge_infra::RateLimitStatus;
    use std::time::Duration;

    const MINUTE: i64 = 60 * 1000;

    async fn due_reminder(env: &TestEnv, repository_id: &str) -> Reminder {
        let reminder = Reminder::new(
            repository_id.into(),
            7,
            None,
            NOW - 60 * MINUTE,
            "alice".into(),
            NOW - 120 * MINUTE,
        );
        env.ctx.repos.reminders.insert(&reminder).await.unwrap();
        reminder
    }

    async fn process(env: &TestEnv, reminder: Reminder) -> ProcessOutcome {
        let mut usecase = ProcessReminderUseCase {
            reminder,
            scheduler: env.scheduler.clone(),
        };
        usecase.execute(&env.ctx).await.unwrap()
    }

    async fn audit_entries(env: &TestEnv, action: AuditAction) -> Vec<AuditLogEntry> {
        env.ctx
            .repos
            .audit_logs
            .find_since(action, 0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_due_reminder() {
        let env = TestEnv::new().await;
        let reminder = due_reminder(&env, "octo/repo").await;

        let outcome = process(&env, reminder.clone()).await;
        assert_eq!(outcome, ProcessOutcome::Sent);

        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Sent);
        assert_eq!(stored.sent_at, Some(NOW));
        assert_eq!(env.tracker.comments()[0].body, "🔔 Reminder");

        let sent = audit_entries(&env, AuditAction::ReminderSent).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].meta["reminderId"], reminder.id.to_string());
        assert_eq!(sent[0].meta["issueNumber"], 7);
        assert_eq!(env.scheduler.state.in_flight(), 0);
    }

    #[tokio::test]
    async fn missing_issue_is_retried_before_dead_lettering() {
        let env = TestEnv::new().await;
        env.tracker.fail_comments_with(Some(404));
        let reminder = due_reminder(&env, "octo/repo").await;

        let outcome = process(&env, reminder.clone()).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Retrying {
                retry_count: 1,
                next_attempt_at: NOW + 5 * MINUTE,
            }
        );
        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Failed);
        assert_eq!(stored.scheduled_at, NOW + 5 * MINUTE);
        assert_eq!(
            stored.error.as_deref(),
            Some("PERMANENT: Issue not found (404)")
        );
        assert_eq!(stored.last_retry_at, Some(NOW));

        let failed = audit_entries(&env, AuditAction::ReminderFailed).await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].meta["retry"], 1);
        assert_eq!(failed[0].meta["nextRetryIn"], "5 minutes");

        let outcome = process(&env, stored).await;
        assert!(matches!(outcome, ProcessOutcome::Retrying { retry_count: 2, .. }));

        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        let outcome = process(&env, stored).await;
        assert_eq!(outcome, ProcessOutcome::Dead { retry_count: 3 });

        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Dead);
        assert_eq!(audit_entries(&env, AuditAction::ReminderDead).await.len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_dead_letter_at_max_retries() {
        let env = TestEnv::new().await;
        env.tracker.fail_comments_with(Some(502));
        let mut reminder = due_reminder(&env, "octo/repo").await;
        reminder.retry_count = 4;
        env.ctx.repos.reminders.save(&reminder).await.unwrap();

        let outcome = process(&env, reminder).await;
        assert_eq!(outcome, ProcessOutcome::Dead { retry_count: 5 });
    }

    #[tokio::test]
    async fn inactive_repository_is_dead_immediately() {
        let env = TestEnv::new().await;
        let mut archived = Repository::new("octo/archived".into(), Some(1));
        archived.is_active = false;
        env.ctx.repos.repositories.insert(&archived).await.unwrap();
        let mut reminder = due_reminder(&env, "octo/archived").await;
        reminder.retry_count = 1;
        reminder.status = ReminderStatus::Failed;
        env.ctx.repos.reminders.save(&reminder).await.unwrap();

        let outcome = process(&env, reminder.clone()).await;
        assert_eq!(outcome, ProcessOutcome::Dead { retry_count: 1 });

        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Dead);
        assert_eq!(stored.error.as_deref(), Some(INACTIVE_REPOSITORY_ERROR));
        assert!(env.tracker.comments().is_empty());

        let dead = audit_entries(&env, AuditAction::ReminderDead).await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].meta["error"], INACTIVE_REPOSITORY_ERROR);
    }

    #[tokio::test]
    async fn missing_repository_is_dead_immediately() {
        let env = TestEnv::new().await;
        let reminder = due_reminder(&env, "octo/deleted").await;

        let outcome = process(&env, reminder).await;
        assert_eq!(outcome, ProcessOutcome::Dead { retry_count: 0 });
    }

    #[tokio::test]
    async fn skips_reminder_claimed_by_someone_else() {
        let env = TestEnv::new().await;
        let reminder = due_reminder(&env, "octo/repo").await;
        env.ctx
            .repos
            .reminders
            .claim(&reminder.id, ReminderStatus::Pending, NOW)
            .await
            .unwrap();

        let outcome = process(&env, reminder).await;
        assert_eq!(outcome, ProcessOutcome::Skipped);
        assert!(env.tracker.comments().is_empty());
        assert!(audit_entries(&env, AuditAction::ReminderSent).await.is_empty());
    }

    #[tokio::test]
    async fn storage_errors_keep_the_claim_instead_of_dead_lettering() {
        let mut env = TestEnv::new().await;
        env.ctx.repos.repositories = Arc::new(UnreachableRepositoryRepo);
        let reminder = due_reminder(&env, "octo/repo").await;

        let mut usecase = ProcessReminderUseCase {
            reminder: reminder.clone(),
            scheduler: env.scheduler.clone(),
        };
        let res = usecase.execute(&env.ctx).await;
        assert!(matches!(res, Err(UseCaseError::Storage(_))));

        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Processing);
        assert_eq!(stored.retry_count, 0);
        assert!(audit_entries(&env, AuditAction::ReminderDead).await.is_empty());
        assert!(env.tracker.comments().is_empty());

        // Released by the reaper, the reminder is due again
        env.sys.advance(6 * MINUTE);
        let released = CleanupStaleLocksUseCase {}.execute(&env.ctx).await.unwrap();
        assert_eq!(released, 1);
    }

    #[tokio::test]
    async fn outcome_is_dropped_once_the_claim_was_released() {
        let env = TestEnv::new().await;
        let reminder = due_reminder(&env, "octo/repo").await;
        // The first worker waits for the quota to reset before delivering
        env.tracker.set_rate_limit(RateLimitStatus {
            remaining: 0,
            reset_at: NOW + 50,
        });

        let (first, second) = tokio::join!(process(&env, reminder.clone()), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            env.sys.advance(6 * MINUTE);
            env.tracker.set_rate_limit(RateLimitStatus {
                remaining: 5000,
                reset_at: 0,
            });
            let released = CleanupStaleLocksUseCase {}.execute(&env.ctx).await.unwrap();
            assert_eq!(released, 1);

            let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
            let outcome = process(&env, stored).await;
            // The first worker fails once it wakes up
            env.tracker.fail_comments_with(Some(502));
            outcome
        });

        assert_eq!(second, ProcessOutcome::Sent);
        assert_eq!(first, ProcessOutcome::ClaimLost);

        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Sent);
        assert_eq!(stored.retry_count, 0);
        assert_eq!(stored.error, None);
        assert_eq!(audit_entries(&env, AuditAction::ReminderSent).await.len(), 1);
        assert!(audit_entries(&env, AuditAction::ReminderFailed).await.is_empty());
    }
}
