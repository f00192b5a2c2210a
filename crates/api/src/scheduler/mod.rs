mod circuit_breaker;
mod delivery;
mod notifications;
pub mod shutdown;
mod state;
mod token_cache;

pub use circuit_breaker::{BreakerState, CircuitBreakers, GITHUB, TELEGRAM};
pub use delivery::{
    classify_error, max_rate_limit_wait, rate_limit_decision, DeliveryClient, RateLimitDecision,
};
pub use notifications::NotificationSink;
pub use state::{HealthReport, HealthStatus, InFlightGuard, SchedulerState};
pub use token_cache::TokenCache;

use nudge_infra::NudgeContext;
use std::sync::Arc;

/// Everything one scheduler instance keeps in memory. Owned by the
/// scheduler loop and shared with the status route.
pub struct Scheduler {
    pub state: SchedulerState,
    pub breakers: Arc<CircuitBreakers>,
    pub delivery: DeliveryClient,
    pub notifications: NotificationSink,
}

impl Scheduler {
    pub fn new(ctx: &NudgeContext) -> Self {
        let breakers = Arc::new(CircuitBreakers::new(
            ctx.config.circuit_breaker_threshold,
            ctx.config.circuit_breaker_cooldown,
            ctx.sys.clone(),
        ));
        Self {
            state: SchedulerState::new(ctx.sys.get_timestamp_millis()),
            delivery: DeliveryClient::new(
                breakers.clone(),
                TokenCache::new(ctx.config.token_cache_ttl),
            ),
            notifications: NotificationSink::new(breakers.clone()),
            breakers,
        }
    }

    pub fn health_report(&self, now: i64) -> HealthReport {
        self.state.report(now, self.breakers.summary())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
