//! Deduplication for notices about expected, recurring conditions.
//!
//! An unreachable configuration backend or a tenant that never filled in
//! its credentials shows up every cycle. Those are logged once per cooldown
//! per condition instead of once per cycle.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

pub const BACKEND_UNAVAILABLE: &str = "config.backend_unavailable";
pub const GROUP_NOT_CONFIGURED: &str = "group.not_configured";

/// Stable identity of a loggable condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub code: &'static str,
    pub subject: String,
}

impl Condition {
    pub fn new(code: &'static str, subject: impl Into<String>) -> Self {
        Self {
            code,
            subject: subject.into(),
        }
    }
}

pub struct LogThrottle {
    limiter: DefaultKeyedRateLimiter<Condition>,
}

impl LogThrottle {
    pub fn new(cooldown: Duration) -> Self {
        let quota = Quota::with_period(cooldown.max(Duration::from_millis(1)))
            .unwrap_or_else(|| Quota::per_hour(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);

        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// True when the condition has not been reported within the cooldown.
    pub fn allow(&self, condition: &Condition) -> bool {
        self.limiter.check_key(condition).is_ok()
    }

    /// Forgets conditions whose cooldown has fully elapsed, so groups that
    /// were renamed or removed stop holding an entry.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }

    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for LogThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogThrottle")
            .field("tracked", &self.tracked())
            .finish()
    }
}
