use serde::{Deserialize, Serialize};

pub mod get_service_health {
    use super::*;
    use crate::dtos::HealthStatusDTO;

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct APIResponse {
        #[serde(flatten)]
        pub health: HealthStatusDTO,
    }

    impl APIResponse {
        pub fn new(health: HealthStatusDTO) -> Self {
            Self { health }
        }
    }
}
