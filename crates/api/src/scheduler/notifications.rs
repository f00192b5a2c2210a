use super::circuit_breaker::{CircuitBreakers, TELEGRAM};
use nudge_infra::NudgeContext;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Best-effort broadcast to the operator notification channel
pub struct NotificationSink {
    breakers: Arc<CircuitBreakers>,
}

impl NotificationSink {
    pub fn new(breakers: Arc<CircuitBreakers>) -> Self {
        Self { breakers }
    }

    /// Never fails, returns whether the message was delivered
    pub async fn send_message(&self, ctx: &NudgeContext, text: &str) -> bool {
        let notifier = match &ctx.services.notifier {
            Some(notifier) => notifier,
            None => {
                debug!("No notification channel configured. Message: {}", text);
                return false;
            }
        };

        if let Err(e) = self.breakers.check(TELEGRAM) {
            warn!("Notification skipped: {}", e);
            return false;
        }

        match notifier.send_message(text).await {
            Ok(()) => {
                self.breakers.record_success(TELEGRAM);
                true
            }
            Err(e) => {
                self.breakers.record_failure(TELEGRAM);
                error!("Notification failed: {:?}", e);
                false
            }
        }
    }
}
