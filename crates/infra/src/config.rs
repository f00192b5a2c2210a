use nudge_domain::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the status server to run on
    pub port: usize,
    /// Maximum number of due `Reminder`s processed in one scheduler cycle
    pub batch_size: i64,
    /// Time to sleep between the end of one scheduler cycle and the start
    /// of the next one
    pub poll_interval: Duration,
    /// Delay before the first scheduler cycle. Gives the network and the
    /// database some time to become ready after a container start.
    pub startup_delay: Duration,
    pub retry_policy: RetryPolicy,
    /// A `Reminder` claimed for longer than this is considered abandoned
    /// by a crashed worker and is released again.
    pub processing_timeout: Duration,
    /// How long a graceful shutdown waits for in-flight reminders
    pub shutdown_grace_period: Duration,
    /// Delivery is postponed when fewer platform requests than this remain
    pub rate_limit_buffer: i64,
    /// Longest time delivery waits for the platform rate limit to reset.
    /// Later resets fail the attempt instead.
    pub rate_limit_max_wait: Duration,
    /// Consecutive failures after which a circuit breaker opens
    pub circuit_breaker_threshold: u32,
    /// How long an open circuit breaker rejects calls
    pub circuit_breaker_cooldown: Duration,
    /// How long an issued installation token is reused
    pub token_cache_ttl: Duration,
    /// The same user can only request one `Reminder` per issue within this window
    pub reminder_recent_window: Duration,
    /// Cadence of the status broadcast to the notification channels
    pub channel_status_interval: Duration,
    pub github: GithubConfig,
    /// `None` when notifications are not configured
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_url: String,
    /// `None` when the GitHub App credentials are missing
    pub app: Option<GithubAppConfig>,
}

#[derive(Clone)]
pub struct GithubAppConfig {
    pub app_id: String,
    /// PEM encoded RSA private key of the GitHub App
    pub private_key: String,
}

impl std::fmt::Debug for GithubAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubAppConfig")
            .field("app_id", &self.app_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chats and channels every notification is sent to
    pub chat_ids: Vec<String>,
    pub api_url: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_ids", &self.chat_ids)
            .field("api_url", &self.api_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn parse_env<T: FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    "The given {}: {} is not valid, falling back to the default: {}.",
                    name, value, default
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Falls back to `default` unless `value` is above zero
fn positive_or_default<T>(name: &str, value: T, default: T) -> T
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value > T::default() {
        return value;
    }
    warn!(
        "The given {}: {} must be above zero, falling back to the default: {}.",
        name, value, default
    );
    default
}

fn parse_env_positive<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    positive_or_default(name, parse_env(name, default), default)
}

fn parse_env_secs(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(parse_env(name, default_secs))
}

fn parse_retry_delays(default: Vec<i64>) -> Vec<i64> {
    const RETRY_DELAYS: &str = "SCHEDULER_RETRY_DELAYS_MIN";

    let value = match std::env::var(RETRY_DELAYS) {
        Ok(value) => value,
        Err(_) => return default,
    };
    let delays = value
        .split(',')
        .map(|d| d.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>();
    match delays {
        Ok(delays) if !delays.is_empty() && delays.iter().all(|d| *d >= 0) => delays,
        _ => {
            warn!(
                "The given {}: {} is not a comma separated list of minutes, falling back to the default: {:?}.",
                RETRY_DELAYS, value, default
            );
            default
        }
    }
}

fn read_github_private_key() -> Option<String> {
    if let Ok(path) = std::env::var("GITHUB_PRIVATE_KEY_PATH") {
        match std::fs::read_to_string(&path) {
            Ok(key) => return Some(key),
            Err(e) => {
                warn!("Unable to read GITHUB_PRIVATE_KEY_PATH: {}. Error: {:?}", path, e);
            }
        }
    }
    std::env::var("GITHUB_PRIVATE_KEY")
        .ok()
        .map(|key| key.replace("\\n", "\n"))
}

impl GithubConfig {
    fn from_env() -> Self {
        let api_url = std::env::var("GITHUB_API_URL")
            .unwrap_or_else(|_| "https://api.github.com".into())
            .trim_end_matches('/')
            .to_string();
        let app = match (std::env::var("GITHUB_APP_ID").ok(), read_github_private_key()) {
            (Some(app_id), Some(private_key)) => Some(GithubAppConfig {
                app_id,
                private_key,
            }),
            _ => {
                warn!("GitHub App credentials are not configured. Reminders cannot be delivered.");
                None
            }
        };
        Self { api_url, app }
    }
}

impl TelegramConfig {
    fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_ids = std::env::var("TELEGRAM_CHAT_IDS")
            .or_else(|_| std::env::var("TELEGRAM_CHAT_ID"))
            .ok()?
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect::<Vec<_>>();
        if chat_ids.is_empty() {
            return None;
        }
        Some(Self {
            bot_token,
            chat_ids,
            api_url: "https://api.telegram.org".into(),
            request_timeout: parse_env_secs("TELEGRAM_TIMEOUT_SECS", 10),
        })
    }
}

impl Config {
    pub fn new() -> Self {
        let default_policy = RetryPolicy::default();
        let retry_policy = RetryPolicy::new(
            parse_env_positive("SCHEDULER_MAX_RETRIES", default_policy.max_retries),
            parse_retry_delays(default_policy.delays_min),
        );
        let telegram = TelegramConfig::from_env();
        if telegram.is_none() {
            info!("Telegram notifications are not configured, metrics and status updates will only be logged.");
        }

        Self {
            port: parse_env("PORT", 5000),
            batch_size: parse_env_positive("SCHEDULER_BATCH_SIZE", 50),
            poll_interval: parse_env_secs("SCHEDULER_POLL_INTERVAL_SECS", 30),
            startup_delay: parse_env_secs("SCHEDULER_STARTUP_DELAY_SECS", 5),
            retry_policy,
            processing_timeout: parse_env_secs("SCHEDULER_PROCESSING_TIMEOUT_SECS", 5 * 60),
            shutdown_grace_period: parse_env_secs("SCHEDULER_SHUTDOWN_GRACE_SECS", 30),
            rate_limit_buffer: parse_env("GITHUB_RATE_LIMIT_BUFFER", 100),
            rate_limit_max_wait: parse_env_secs("GITHUB_RATE_LIMIT_MAX_WAIT_SECS", 5 * 60),
            circuit_breaker_threshold: parse_env_positive("CIRCUIT_BREAKER_THRESHOLD", 5),
            circuit_breaker_cooldown: parse_env_secs("CIRCUIT_BREAKER_COOLDOWN_SECS", 60),
            token_cache_ttl: parse_env_secs("TOKEN_CACHE_TTL_SECS", 50 * 60),
            reminder_recent_window: parse_env_secs("REMINDER_RECENT_WINDOW_SECS", 5 * 60),
            channel_status_interval: parse_env_secs("CHANNEL_STATUS_INTERVAL_SECS", 60 * 60),
            github: GithubConfig::from_env(),
            telegram,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
