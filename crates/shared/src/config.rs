//! Environment-driven configuration
//!
//! Everything has a sensible default so a bare `recurpay-worker` starts
//! without any environment set up; production overrides via env vars.

use std::env;

/// Configuration for the background worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Cron schedule for overdue detection (default: daily at 01:00 UTC)
    pub overdue_cron: String,
    /// Cron schedule for auto-expiration (default: daily at 01:30 UTC)
    pub expiration_cron: String,
    /// Cron schedule for payment reminders (default: daily at 09:00 UTC)
    pub reminder_cron: String,
    /// Cron schedule for pending-notification processing
    /// (default: every 5 minutes)
    pub notification_cron: String,
    /// Base URL embedded in generated payment links
    pub payment_link_base: String,
    /// Endpoint of the outbound notification channel provider
    pub sender_endpoint: String,
    /// Per-call timeout for the channel provider, in seconds
    pub sender_timeout_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let sender_timeout_secs = env::var("RECURPAY_SENDER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            overdue_cron: env_or("RECURPAY_OVERDUE_CRON", "0 0 1 * * *"),
            expiration_cron: env_or("RECURPAY_EXPIRATION_CRON", "0 30 1 * * *"),
            reminder_cron: env_or("RECURPAY_REMINDER_CRON", "0 0 9 * * *"),
            notification_cron: env_or("RECURPAY_NOTIFICATION_CRON", "0 */5 * * * *"),
            payment_link_base: env_or("RECURPAY_PAYMENT_LINK_BASE", "http://localhost:8080"),
            sender_endpoint: env_or("RECURPAY_SENDER_ENDPOINT", "http://localhost:9090/send"),
            sender_timeout_secs,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
