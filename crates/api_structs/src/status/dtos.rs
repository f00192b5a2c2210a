use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the reminder scheduler health
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusDTO {
    /// One of `starting`, `healthy`, `degraded` or `unhealthy`
    pub status: String,
    pub last_run: Option<i64>,
    pub last_success: Option<i64>,
    pub consecutive_failures: u32,
    pub processed_total: u64,
    pub uptime_secs: i64,
    /// `open` or `closed` per external service
    pub circuit_breakers: BTreeMap<String, String>,
    pub active_processing: usize,
}
