mod audit_log;
mod delivery;
mod metrics;
mod reminder;
mod repository;
mod retry;
mod shared;

pub use audit_log::{AuditAction, AuditLogEntry};
pub use delivery::{DeliveryError, ErrorKind};
pub use metrics::{start_of_utc_day, utc_date, DailyMetrics};
pub use reminder::{
    truncate_error, FailureOutcome, Reminder, ReminderStatus, DEFAULT_REMINDER_MESSAGE,
    INACTIVE_REPOSITORY_ERROR, MAX_ERROR_LEN,
};
pub use repository::Repository;
pub use retry::RetryPolicy;
pub use shared::entity::{Entity, ID};
