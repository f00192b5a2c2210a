use super::state::SchedulerState;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Stops the scheduler from starting new work and waits up to `grace_period`
/// for in-flight reminders to finish. Returns `true` when reminders were
/// still in flight after the grace period.
pub async fn drain(state: &SchedulerState, grace_period: Duration) -> bool {
    info!("Starting graceful shutdown");
    state.request_shutdown();

    let deadline = Instant::now() + grace_period;
    loop {
        let in_flight = state.in_flight();
        let now = Instant::now();
        if in_flight == 0 || now >= deadline {
            break;
        }
        info!("Waiting for {} reminders...", in_flight);
        sleep(DRAIN_POLL_INTERVAL.min(deadline - now)).await;
    }

    let in_flight = state.in_flight();
    if in_flight > 0 {
        warn!("Forced shutdown with {} reminders processing", in_flight);
        return true;
    }
    info!("Graceful shutdown complete");
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_scheduler_drains_immediately() {
        let state = SchedulerState::new(0);
        let forced = drain(&state, Duration::from_secs(30)).await;

        assert!(!forced);
        assert!(state.is_shutting_down());
    }

    #[tokio::test]
    async fn waits_for_in_flight_reminders() {
        let state = SchedulerState::new(0);
        let guard = state.begin_processing();

        let (forced, _) = tokio::join!(drain(&state, Duration::from_secs(5)), async {
            sleep(Duration::from_millis(50)).await;
            drop(guard);
        });
        assert!(!forced);
    }

    #[tokio::test]
    async fn forces_shutdown_after_grace_period() {
        let state = SchedulerState::new(0);
        let _guard = state.begin_processing();

        let forced = drain(&state, Duration::from_millis(50)).await;
        assert!(forced);
    }
}
