use crate::{
    reminder::{
        cleanup_stale_locks::CleanupStaleLocksUseCase,
        process_reminder::{ProcessOutcome, ProcessReminderUseCase},
        send_channel_status::{ChannelStatusKind, SendChannelStatusUseCase},
        send_daily_metrics::SendDailyMetricsUseCase,
    },
    scheduler::Scheduler,
    shared::usecase::execute,
};
use nudge_domain::ReminderStatus;
use nudge_infra::{DueRemindersQuery, NudgeContext};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time::sleep};
use tracing::{error, info};

/// Sleeps for `duration` unless a shutdown is requested first.
/// Returns `true` when the scheduler is shutting down.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
    let shutting_down = *shutdown.borrow();
    shutting_down
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Reminders that went through a delivery attempt
    pub processed: u64,
    pub succeeded: bool,
}

/// One scheduler cycle: release stale locks, process the due batch oldest
/// first, send the daily metrics and update the health status.
/// Never fails, errors are logged and make the cycle count as failed.
pub async fn run_cycle(ctx: &NudgeContext, scheduler: &Arc<Scheduler>) -> CycleReport {
    let mut succeeded = execute(CleanupStaleLocksUseCase {}, ctx).await.is_ok();

    let query = DueRemindersQuery {
        statuses: ReminderStatus::claimable().to_vec(),
        scheduled_before: ctx.sys.get_timestamp_millis(),
        retry_count_below: ctx.config.retry_policy.max_retries,
        limit: ctx.config.batch_size,
    };
    let due = match ctx.repos.reminders.find_due(&query).await {
        Ok(due) => due,
        Err(e) => {
            error!("Unable to fetch due reminders. Error: {:?}", e);
            succeeded = false;
            Vec::new()
        }
    };

    let mut processed = 0;
    for reminder in due {
        if scheduler.state.is_shutting_down() {
            info!("Shutdown requested, leaving the rest of the batch");
            break;
        }
        let usecase = ProcessReminderUseCase {
            reminder,
            scheduler: scheduler.clone(),
        };
        match execute(usecase, ctx).await {
            Ok(ProcessOutcome::Skipped | ProcessOutcome::ClaimLost) => {}
            Ok(_) => processed += 1,
            Err(_) => succeeded = false,
        }
    }

    let metrics = SendDailyMetricsUseCase {
        scheduler: scheduler.clone(),
    };
    if execute(metrics, ctx).await.is_err() {
        succeeded = false;
    }

    scheduler
        .state
        .record_cycle(ctx.sys.get_timestamp_millis(), succeeded, processed);
    CycleReport {
        processed,
        succeeded,
    }
}

/// Runs scheduler cycles until shutdown. The next cycle is only scheduled
/// once the current one has completed, so cycles never overlap.
pub async fn run_scheduler_loop(ctx: NudgeContext, scheduler: Arc<Scheduler>) {
    let mut shutdown = scheduler.state.subscribe_shutdown();
    if sleep_or_shutdown(&mut shutdown, ctx.config.startup_delay).await {
        return;
    }

    info!(
        "Reminder scheduler started, polling every {:?}",
        ctx.config.poll_interval
    );
    loop {
        let report = run_cycle(&ctx, &scheduler).await;
        if report.processed > 0 || !report.succeeded {
            info!("Scheduler cycle finished: {:?}", report);
        }
        if sleep_or_shutdown(&mut shutdown, ctx.config.poll_interval).await {
            break;
        }
    }
    info!("Reminder scheduler stopped");
}

pub fn start_reminder_scheduler(ctx: NudgeContext, scheduler: Arc<Scheduler>) {
    actix_web::rt::spawn(run_scheduler_loop(ctx, scheduler));
}

pub fn start_channel_status_job(ctx: NudgeContext, scheduler: Arc<Scheduler>) {
    actix_web::rt::spawn(async move {
        let startup = SendChannelStatusUseCase {
            kind: ChannelStatusKind::Startup,
            scheduler: scheduler.clone(),
        };
        let _ = execute(startup, &ctx).await;

        let mut shutdown = scheduler.state.subscribe_shutdown();
        while !sleep_or_shutdown(&mut shutdown, ctx.config.channel_status_interval).await {
            let status = SendChannelStatusUseCase {
                kind: ChannelStatusKind::Periodic,
                scheduler: scheduler.clone(),
            };
            let _ = execute(status, &ctx).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scheduler::HealthStatus,
        shared::fakes::{TestEnv, NOW},
    };
    use nudge_domain::Reminder;

    const MINUTE: i64 = 60 * 1000;

    async fn insert_due(env: &TestEnv, issue_number: i64, scheduled_at: i64) -> Reminder {
        let reminder = Reminder::new(
            "octo/repo".into(),
            issue_number,
            Some(format!("issue {}", issue_number)),
            scheduled_at,
            "alice".into(),
            NOW - 120 * MINUTE,
        );
        env.ctx.repos.reminders.insert(&reminder).await.unwrap();
        reminder
    }

    #[tokio::test]
    async fn cycle_delivers_due_reminders_oldest_first() {
        let env = TestEnv::new().await;
        insert_due(&env, 1, NOW - MINUTE).await;
        insert_due(&env, 2, NOW - 10 * MINUTE).await;
        insert_due(&env, 3, NOW + 10 * MINUTE).await;

        let report = run_cycle(&env.ctx, &env.scheduler).await;
        assert_eq!(
            report,
            CycleReport {
                processed: 2,
                succeeded: true
            }
        );

        let bodies = env
            .tracker
            .comments()
            .into_iter()
            .map(|c| c.body)
            .collect::<Vec<_>>();
        assert_eq!(bodies, vec!["issue 2".to_string(), "issue 1".to_string()]);

        let report = env.scheduler.health_report(NOW);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.processed_total, 2);
        assert_eq!(report.last_success, Some(NOW));
        // The daily metrics went out with the first cycle
        assert_eq!(env.notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn failed_reminders_are_retried_once_due_again() {
        let env = TestEnv::new().await;
        let reminder = insert_due(&env, 1, NOW - MINUTE).await;
        env.tracker.fail_comments_with(Some(502));

        run_cycle(&env.ctx, &env.scheduler).await;
        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Failed);

        env.tracker.fail_comments_with(None);
        let report = run_cycle(&env.ctx, &env.scheduler).await;
        assert_eq!(report.processed, 0);

        env.sys.advance(5 * MINUTE);
        let report = run_cycle(&env.ctx, &env.scheduler).await;
        assert_eq!(report.processed, 1);
        let stored = env.ctx.repos.reminders.find(&reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Sent);
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn shutdown_leaves_the_batch() {
        let env = TestEnv::new().await;
        insert_due(&env, 1, NOW - MINUTE).await;
        env.scheduler.state.request_shutdown();

        let report = run_cycle(&env.ctx, &env.scheduler).await;
        assert_eq!(report.processed, 0);
        assert!(env.tracker.comments().is_empty());
    }

    #[tokio::test]
    async fn loop_runs_until_shutdown() {
        let mut env = TestEnv::new().await;
        env.ctx.config.startup_delay = Duration::from_millis(1);
        env.ctx.config.poll_interval = Duration::from_millis(5);
        insert_due(&env, 1, NOW - MINUTE).await;

        let scheduler = env.scheduler.clone();
        tokio::join!(run_scheduler_loop(env.ctx.clone(), scheduler.clone()), async {
            sleep(Duration::from_millis(50)).await;
            scheduler.state.request_shutdown();
        });

        assert_eq!(env.tracker.comments().len(), 1);
        assert!(env.scheduler.health_report(NOW).last_run.is_some());
    }

    #[tokio::test]
    async fn shutdown_during_startup_delay_skips_all_cycles() {
        let mut env = TestEnv::new().await;
        env.ctx.config.startup_delay = Duration::from_secs(60);
        insert_due(&env, 1, NOW - MINUTE).await;

        let scheduler = env.scheduler.clone();
        tokio::join!(run_scheduler_loop(env.ctx.clone(), scheduler.clone()), async {
            sleep(Duration::from_millis(10)).await;
            scheduler.state.request_shutdown();
        });

        assert!(env.tracker.comments().is_empty());
        assert_eq!(env.scheduler.state.status(), HealthStatus::Starting);
    }
}
