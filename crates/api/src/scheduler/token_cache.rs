use super::delivery::classify_error;
use nudge_domain::DeliveryError;
use nudge_infra::NudgeContext;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Caches installation access tokens per `Repository`
pub struct TokenCache {
    ttl_millis: i64,
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self, repository_id: &str, now: i64) -> Option<String> {
        self.lock()
            .get(repository_id)
            .filter(|cached| cached.expires_at > now)
            .map(|cached| cached.token.clone())
    }

    /// Returns a valid access token for the `Repository`, issuing a new
    /// one when none is cached or the cached one has expired.
    pub async fn get_token(
        &self,
        ctx: &NudgeContext,
        repository_id: &str,
    ) -> Result<String, DeliveryError> {
        let now = ctx.sys.get_timestamp_millis();
        if let Some(token) = self.cached(repository_id, now) {
            return Ok(token);
        }

        let repository = ctx
            .repos
            .repositories
            .find(repository_id)
            .await
            .map_err(|e| {
                DeliveryError::transient(format!(
                    "Unable to look up repository {}: {}",
                    repository_id, e
                ))
            })?
            .ok_or_else(|| {
                DeliveryError::permanent(format!("Repository {} not found", repository_id))
            })?;
        let installation_id = repository.installation_id.ok_or_else(|| {
            DeliveryError::permanent(format!(
                "No installation_id for repository {}",
                repository_id
            ))
        })?;

        debug!("Issuing access token for repository {}", repository_id);
        let credential = ctx
            .services
            .issue_tracker
            .issue_installation_credential(installation_id)
            .await
            .map_err(|e| classify_error(&e))?;

        let expires_at = (now + self.ttl_millis).min(credential.expires_at);
        self.lock().insert(
            repository_id.to_string(),
            CachedToken {
                token: credential.token.clone(),
                expires_at,
            },
        );
        Ok(credential.token)
    }

    /// Drops the cached token, e.g. after it was rejected
    pub fn invalidate(&self, repository_id: &str) {
        self.lock().remove(repository_id);
    }
}
