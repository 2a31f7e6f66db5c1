//! Rate limit bookkeeping
//!
//! OSM enforces a per-credential quota and reports it in `x-ratelimit-*` headers.
//! The thresholds below are empirical: OSM does not document them, so they are all part of a tunable [`RateLimitPolicy`].

use std::time::Duration;

use crate::client::HttpResponse;

/// The quota as reported by the last response
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimitState {
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the quota is reset
    pub reset: u64,
}

impl RateLimitState {
    /// Read the `x-ratelimit-limit`, `x-ratelimit-remaining` and `x-ratelimit-reset` headers.
    /// Returns `None` unless all three are present and numeric.
    pub fn from_response(response: &HttpResponse) -> Option<Self> {
        let limit = header_u64(response, "x-ratelimit-limit")?;
        let remaining = header_u64(response, "x-ratelimit-remaining")?;
        let reset = header_u64(response, "x-ratelimit-reset")?;
        Some(Self { limit, remaining, reset })
    }

    /// Fraction of the quota already used, between 0 and 1
    pub fn consumed(&self) -> f64 {
        if self.limit == 0 {
            return 1.0;
        }
        let used = self.limit.saturating_sub(self.remaining);
        used as f64 / self.limit as f64
    }
}

/// How worried we are about the remaining quota
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum UsageLevel {
    Normal,
    Notice,
    Warning,
    Critical,
}

/// Tunables of the rate limiter
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitPolicy {
    /// Consumed fractions at which the usage becomes `Notice`, `Warning` and `Critical`
    pub thresholds: [f64; 3],
    /// Once this fraction is consumed, wait for the whole reset window before going on
    pub pause_threshold: f64,
    /// Added to the reset window when pausing
    pub pause_margin: Duration,
    /// Total number of attempts for a request that keeps getting 429
    pub max_attempts: u32,
    /// Used for a 429 that says neither `Retry-After` nor `x-ratelimit-reset`
    pub default_retry_after: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            thresholds: [0.5, 0.8, 0.95],
            pause_threshold: 0.95,
            pause_margin: Duration::from_secs(5),
            max_attempts: 2,
            default_retry_after: Duration::from_secs(60),
        }
    }
}

impl RateLimitPolicy {
    pub fn level(&self, state: &RateLimitState) -> UsageLevel {
        let consumed = state.consumed();
        if consumed >= self.thresholds[2] {
            UsageLevel::Critical
        } else if consumed >= self.thresholds[1] {
            UsageLevel::Warning
        } else if consumed >= self.thresholds[0] {
            UsageLevel::Notice
        } else {
            UsageLevel::Normal
        }
    }

    /// How long to wait before issuing the next request, if at all
    pub fn pause_for(&self, state: &RateLimitState) -> Option<Duration> {
        if state.consumed() >= self.pause_threshold {
            Some(Duration::from_secs(state.reset) + self.pause_margin)
        } else {
            None
        }
    }

    /// Log the usage level of `state`, and return the pause required before the next request
    pub fn observe(&self, state: &RateLimitState) -> Option<Duration> {
        let pct = state.consumed() * 100.0;
        match self.level(state) {
            UsageLevel::Normal => log::trace!("Rate limit: {}/{} remaining", state.remaining, state.limit),
            UsageLevel::Notice => log::info!("Rate limit: {:.0}% used ({} remaining, reset in {}s)", pct, state.remaining, state.reset),
            UsageLevel::Warning => log::warn!("Rate limit: {:.0}% used ({} remaining, reset in {}s)", pct, state.remaining, state.reset),
            UsageLevel::Critical => log::warn!("Rate limit nearly exhausted: {:.0}% used ({} remaining, reset in {}s)", pct, state.remaining, state.reset),
        }
        self.pause_for(state)
    }

    /// How long a 429 response asks us to wait
    pub fn retry_delay(&self, response: &HttpResponse) -> Duration {
        header_u64(response, "retry-after")
            .or_else(|| header_u64(response, "x-ratelimit-reset"))
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
    }
}

fn header_u64(response: &HttpResponse, name: &str) -> Option<u64> {
    response.header(name).and_then(|v| v.trim().parse().ok())
}
