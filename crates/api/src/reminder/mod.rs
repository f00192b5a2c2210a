pub mod cleanup_stale_locks;
pub mod create_reminder;
pub mod process_reminder;
pub mod send_channel_status;
pub mod send_daily_metrics;
