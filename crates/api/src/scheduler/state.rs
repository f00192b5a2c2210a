use std::{
    collections::BTreeMap,
    fmt::Display,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};
use tokio::sync::watch;

/// A cycle failing this many times in a row makes the scheduler unhealthy
const UNHEALTHY_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// No scheduler cycle has completed yet
    Starting,
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_consecutive_failures(failures: u32) -> Self {
        match failures {
            0 => Self::Healthy,
            f if f < UNHEALTHY_AFTER_FAILURES => Self::Degraded,
            _ => Self::Unhealthy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct HealthCheck {
    status: HealthStatus,
    last_run: Option<i64>,
    last_success: Option<i64>,
    consecutive_failures: u32,
    processed_total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub last_run: Option<i64>,
    pub last_success: Option<i64>,
    pub consecutive_failures: u32,
    pub processed_total: u64,
    pub uptime_secs: i64,
    pub circuit_breakers: BTreeMap<String, String>,
    pub active_processing: usize,
}

/// In-memory state of one scheduler instance: health bookkeeping, the
/// number of reminders being processed and the shutdown flag.
#[derive(Debug)]
pub struct SchedulerState {
    started_at: i64,
    health: Mutex<HealthCheck>,
    in_flight: AtomicUsize,
    shutdown: watch::Sender<bool>,
}

/// Counts a reminder as in flight until dropped
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SchedulerState {
    pub fn new(started_at: i64) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            started_at,
            health: Mutex::new(HealthCheck {
                status: HealthStatus::Starting,
                last_run: None,
                last_success: None,
                consecutive_failures: 0,
                processed_total: 0,
            }),
            in_flight: AtomicUsize::new(0),
            shutdown,
        }
    }

    fn health(&self) -> MutexGuard<'_, HealthCheck> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the outcome of one scheduler cycle that ended at `now`
    pub fn record_cycle(&self, now: i64, succeeded: bool, processed: u64) {
        let mut health = self.health();
        health.last_run = Some(now);
        health.processed_total += processed;
        if succeeded {
            health.last_success = Some(now);
            health.consecutive_failures = 0;
        } else {
            health.consecutive_failures += 1;
        }
        health.status = HealthStatus::from_consecutive_failures(health.consecutive_failures);
    }

    pub fn status(&self) -> HealthStatus {
        self.health().status
    }

    pub fn processed_total(&self) -> u64 {
        self.health().processed_total
    }

    pub fn report(&self, now: i64, circuit_breakers: BTreeMap<String, String>) -> HealthReport {
        let health = self.health();
        HealthReport {
            status: health.status,
            last_run: health.last_run,
            last_success: health.last_success,
            consecutive_failures: health.consecutive_failures,
            processed_total: health.processed_total,
            uptime_secs: (now - self.started_at).max(0) / 1000,
            circuit_breakers,
            active_processing: self.in_flight(),
        }
    }

    pub fn begin_processing(&self) -> InFlightGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            in_flight: &self.in_flight,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_follows_the_failure_streak() {
        let state = SchedulerState::new(0);
        assert_eq!(state.status(), HealthStatus::Starting);

        state.record_cycle(1000, true, 3);
        assert_eq!(state.status(), HealthStatus::Healthy);

        state.record_cycle(2000, false, 0);
        assert_eq!(state.status(), HealthStatus::Degraded);
        state.record_cycle(3000, false, 1);
        assert_eq!(state.status(), HealthStatus::Degraded);
        state.record_cycle(4000, false, 0);
        assert_eq!(state.status(), HealthStatus::Unhealthy);

        let report = state.report(10_000, BTreeMap::new());
        assert_eq!(report.last_run, Some(4000));
        assert_eq!(report.last_success, Some(1000));
        assert_eq!(report.consecutive_failures, 3);
        assert_eq!(report.processed_total, 4);
        assert_eq!(report.uptime_secs, 10);

        state.record_cycle(5000, true, 0);
        assert_eq!(state.status(), HealthStatus::Healthy);
    }

    #[test]
    fn guards_track_in_flight_reminders() {
        let state = SchedulerState::new(0);
        let first = state.begin_processing();
        let second = state.begin_processing();
        assert_eq!(state.in_flight(), 2);

        drop(first);
        assert_eq!(state.in_flight(), 1);
        drop(second);
        assert_eq!(state.report(0, BTreeMap::new()).active_processing, 0);
    }

    #[test]
    fn shutdown_is_visible_to_subscribers() {
        let state = SchedulerState::new(0);
        let receiver = state.subscribe_shutdown();
        assert!(!state.is_shutting_down());

        state.request_shutdown();
        assert!(state.is_shutting_down());
        assert!(*receiver.borrow());
    }
}
