use super::{
    circuit_breaker::{CircuitBreakers, GITHUB},
    token_cache::TokenCache,
};
use nudge_domain::{DeliveryError, Repository};
use nudge_infra::{Config, IssueTrackerError, NudgeContext, RateLimitStatus};
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Converts an issue tracker failure into a `DeliveryError` of the right kind
pub fn classify_error(e: &IssueTrackerError) -> DeliveryError {
    match e {
        IssueTrackerError::NotConfigured(msg) => DeliveryError::permanent(msg.clone()),
        IssueTrackerError::Status { status, .. } => match status {
            404 | 410 => DeliveryError::permanent(format!("Issue not found ({})", status)),
            401 | 403 => DeliveryError::permanent(format!("Authentication failed ({})", status)),
            429 => DeliveryError::transient("Rate limit exceeded"),
            _ => DeliveryError::transient(e.to_string()),
        },
        IssueTrackerError::Transport(_) => DeliveryError::transient(e.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Proceed,
    /// The quota resets soon, wait this long before delivering
    Wait(Duration),
    /// The quota resets too late to wait for it
    Exhausted,
}

/// Added to every rate limit wait so that the quota has surely been restored
const RESET_MARGIN: Duration = Duration::from_secs(1);

/// Longest rate limit wait allowed while holding a claim. The whole wait
/// stays within half the processing timeout, so the stale-lock reaper never
/// releases a reminder that is still waiting for its delivery.
pub fn max_rate_limit_wait(config: &Config) -> Duration {
    let claim_budget = (config.processing_timeout / 2).saturating_sub(RESET_MARGIN);
    config.rate_limit_max_wait.min(claim_budget)
}

pub fn rate_limit_decision(
    status: &RateLimitStatus,
    now: i64,
    buffer: i64,
    max_wait: Duration,
) -> RateLimitDecision {
    if status.remaining >= buffer {
        return RateLimitDecision::Proceed;
    }
    let wait = status.reset_at - now;
    let max_wait = i64::try_from(max_wait.as_millis()).unwrap_or(i64::MAX);
    if wait > 0 && wait < max_wait {
        RateLimitDecision::Wait(Duration::from_millis(wait as u64) + RESET_MARGIN)
    } else {
        RateLimitDecision::Exhausted
    }
}

/// Posts reminder comments on the issue tracker
pub struct DeliveryClient {
    breakers: Arc<CircuitBreakers>,
    tokens: TokenCache,
}

impl DeliveryClient {
    pub fn new(breakers: Arc<CircuitBreakers>, tokens: TokenCache) -> Self {
        Self { breakers, tokens }
    }

    pub async fn post_comment(
        &self,
        ctx: &NudgeContext,
        repository_id: &str,
        issue_number: i64,
        message: &str,
    ) -> Result<(), DeliveryError> {
        self.breakers.check(GITHUB)?;

        match self
            .deliver(ctx, repository_id, issue_number, message)
            .await
        {
            Ok(()) => {
                self.breakers.record_success(GITHUB);
                Ok(())
            }
            Err(e) => {
                self.breakers.record_failure(GITHUB);
                Err(e)
            }
        }
    }

    async fn deliver(
        &self,
        ctx: &NudgeContext,
        repository_id: &str,
        issue_number: i64,
        message: &str,
    ) -> Result<(), DeliveryError> {
        let (owner, repo) = Repository::owner_and_name(repository_id).ok_or_else(|| {
            DeliveryError::permanent(format!("Invalid repository name {}", repository_id))
        })?;
        let token = self.tokens.get_token(ctx, repository_id).await?;

        self.respect_rate_limit(ctx, &token).await?;

        ctx.services
            .issue_tracker
            .create_issue_comment(&token, owner, repo, issue_number, message)
            .await
            .map_err(|e| {
                if e.status() == Some(401) {
                    self.tokens.invalidate(repository_id);
                }
                classify_error(&e)
            })
    }

    async fn respect_rate_limit(&self, ctx: &NudgeContext, token: &str) -> Result<(), DeliveryError> {
        let status = ctx
            .services
            .issue_tracker
            .get_rate_limit_status(token)
            .await
            .map_err(|e| classify_error(&e))?;
        let now = ctx.sys.get_timestamp_millis();

        match rate_limit_decision(
            &status,
            now,
            ctx.config.rate_limit_buffer,
            max_rate_limit_wait(&ctx.config),
        ) {
            RateLimitDecision::Proceed => Ok(()),
            RateLimitDecision::Wait(wait) => {
                warn!(
                    "{} GitHub requests remaining, waiting {:?} for the quota to reset",
                    status.remaining, wait
                );
                tokio::time::sleep(wait).await;
                Ok(())
            }
            RateLimitDecision::Exhausted => {
                warn!(
                    "{} GitHub requests remaining, quota resets at {}",
                    status.remaining, status.reset_at
                );
                Err(DeliveryError::transient("GitHub rate limit exhausted"))
            }
        }
    }
}
