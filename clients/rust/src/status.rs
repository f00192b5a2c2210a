use crate::{APIResponse, BaseClient};
use nudge_api_structs::get_service_health;
use reqwest::StatusCode;
use std::sync::Arc;

#[derive(Clone)]
pub struct StatusClient {
    base: Arc<BaseClient>,
}

impl StatusClient {
    pub(crate) fn new(base: Arc<BaseClient>) -> Self {
        Self { base }
    }

    /// Health of the reminder scheduler
    pub async fn get(&self) -> APIResponse<get_service_health::APIResponse> {
        self.base.get("status".into(), StatusCode::OK).await
    }
}
