const MINUTE_MILLIS: i64 = 1000 * 60;

/// Backoff schedule and dead-letter rules for failed `Reminder` deliveries.
///
/// Pure and deterministic so that every decision can be tested without I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// A `Reminder` that has failed this many times is dead regardless of
    /// the kind of error
    pub max_retries: i32,
    /// A `Reminder` failing with a permanent error is dead once it has
    /// failed this many times
    pub permanent_error_threshold: i32,
    /// Minutes to wait before the next attempt, indexed by retry count.
    /// The last entry is used for every retry count beyond the table.
    pub delays_min: Vec<i64>,
}

impl RetryPolicy {
    pub fn new(max_retries: i32, delays_min: Vec<i64>) -> Self {
        Self {
            max_retries,
            permanent_error_threshold: 3,
            delays_min,
        }
    }

    /// Minutes to wait before retrying after `retry_count` failed attempts
    pub fn next_delay(&self, retry_count: i32) -> i64 {
        let last = match self.delays_min.len() {
            0 => return 0,
            len => len - 1,
        };
        let index = usize::try_from(retry_count.max(0)).unwrap_or(last).min(last);
        self.delays_min[index]
    }

    pub fn is_dead(&self, retry_count: i32, is_permanent_error: bool) -> bool {
        retry_count >= self.max_retries
            || (retry_count >= self.permanent_error_threshold && is_permanent_error)
    }

    /// Timestamp of the next attempt or `None` when there will be no
    /// further attempts
    pub fn next_scheduled_at(&self, now: i64, retry_count: i32, is_dead: bool) -> Option<i64> {
        if is_dead {
            return None;
        }
        Some(now + self.next_delay(retry_count) * MINUTE_MILLIS)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, vec![5, 15, 30, 60, 120])
    }
}
