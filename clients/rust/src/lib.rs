mod base;
mod status;

pub(crate) use base::BaseClient;
pub use base::{APIError, APIErrorVariant, APIResponse};
pub use nudge_api_structs::dtos::*;
use status::StatusClient;
use std::sync::Arc;

pub use nudge_api_structs::dtos::HealthStatusDTO as HealthStatus;

/// Nudge Server SDK
///
/// The SDK contains methods for interacting with the Nudge reminder
/// scheduler API.
#[derive(Clone)]
pub struct NudgeSDK {
    pub status: StatusClient,
}

impl NudgeSDK {
    pub fn new(address: String) -> Self {
        let base = Arc::new(BaseClient::new(address));
        let status = StatusClient::new(base);

        Self { status }
    }
}
