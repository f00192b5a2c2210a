use nudge_domain::DeliveryError;
use nudge_infra::ISys;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{info, warn};

/// Breaker guarding the issue tracker API
pub const GITHUB: &str = "github";
/// Breaker guarding the notification channel
pub const TELEGRAM: &str = "telegram";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakerState {
    pub failures: u32,
    pub last_failure_at: Option<i64>,
    pub is_open: bool,
}

/// Process local circuit breakers, one per external service name.
///
/// A breaker opens after `threshold` consecutive failures and rejects calls
/// until `cooldown` has passed since the last failure. The first check after
/// the cooldown closes it again.
pub struct CircuitBreakers {
    threshold: u32,
    cooldown_millis: i64,
    sys: Arc<dyn ISys>,
    breakers: Mutex<HashMap<String, BreakerState>>,
}

impl CircuitBreakers {
    pub fn new(threshold: u32, cooldown: Duration, sys: Arc<dyn ISys>) -> Self {
        Self {
            threshold,
            cooldown_millis: i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX),
            sys,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BreakerState>> {
        self.breakers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fails with a permanent error while the breaker of `service` is open
    pub fn check(&self, service: &str) -> Result<(), DeliveryError> {
        let now = self.sys.get_timestamp_millis();
        let mut breakers = self.lock();
        let breaker = match breakers.get_mut(service) {
            Some(breaker) if breaker.is_open => breaker,
            _ => return Ok(()),
        };

        let last_failure_at = breaker.last_failure_at.unwrap_or(now);
        if now - last_failure_at < self.cooldown_millis {
            return Err(DeliveryError::permanent(format!(
                "{} circuit breaker is open",
                service
            )));
        }

        info!("Circuit breaker for {} cooled down, closing it", service);
        *breaker = BreakerState::default();
        Ok(())
    }

    pub fn record_success(&self, service: &str) {
        if let Some(breaker) = self.lock().get_mut(service) {
            breaker.failures = 0;
        }
    }

    pub fn record_failure(&self, service: &str) {
        let now = self.sys.get_timestamp_millis();
        let mut breakers = self.lock();
        let breaker = breakers.entry(service.to_string()).or_default();
        breaker.failures += 1;
        breaker.last_failure_at = Some(now);

        if !breaker.is_open && breaker.failures >= self.threshold {
            breaker.is_open = true;
            warn!(
                "Circuit breaker for {} opened after {} failures",
                service, breaker.failures
            );
        }
    }

    pub fn state(&self, service: &str) -> BreakerState {
        self.lock().get(service).cloned().unwrap_or_default()
    }

    /// `open` or `closed` for the known services and every service seen so far
    pub fn summary(&self) -> BTreeMap<String, String> {
        let breakers = self.lock();
        let mut summary = BTreeMap::new();
        for service in [GITHUB, TELEGRAM] {
            summary.insert(service.to_string(), "closed".to_string());
        }
        for (service, breaker) in breakers.iter() {
            let state = if breaker.is_open { "open" } else { "closed" };
            summary.insert(service.clone(), state.to_string());
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_infra::ManualSys;

    const NOW: i64 = 1_700_000_000_000;

    fn breakers() -> (CircuitBreakers, Arc<ManualSys>) {
        let sys = Arc::new(ManualSys::new(NOW));
        let breakers = CircuitBreakers::new(5, Duration::from_secs(60), sys.clone());
        (breakers, sys)
    }

    #[test]
    fn trips_after_threshold_and_closes_after_cooldown() {
        let (breakers, sys) = breakers();

        for _ in 0..4 {
            breakers.record_failure("x");
        }
        assert!(breakers.check("x").is_ok());

        breakers.record_failure("x");
        assert!(breakers.state("x").is_open);
        let err = breakers.check("x").unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(err.to_string(), "PERMANENT: x circuit breaker is open");

        sys.advance(59 * 1000);
        assert!(breakers.check("x").is_err());

        sys.advance(1000);
        assert!(breakers.check("x").is_ok());
        assert_eq!(breakers.state("x"), BreakerState::default());
    }

    #[test]
    fn success_resets_the_failure_count() {
        let (breakers, _) = breakers();
        for _ in 0..4 {
            breakers.record_failure("x");
        }
        breakers.record_success("x");
        breakers.record_failure("x");

        assert_eq!(breakers.state("x").failures, 1);
        assert!(breakers.check("x").is_ok());
    }

    #[test]
    fn services_are_independent() {
        let (breakers, _) = breakers();
        for _ in 0..5 {
            breakers.record_failure(GITHUB);
        }

        assert!(breakers.check(GITHUB).is_err());
        assert!(breakers.check(TELEGRAM).is_ok());
        let summary = breakers.summary();
        assert_eq!(summary.get(GITHUB).map(String::as_str), Some("open"));
        assert_eq!(summary.get(TELEGRAM).map(String::as_str), Some("closed"));
    }
}
