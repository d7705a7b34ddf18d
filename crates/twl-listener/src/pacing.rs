//! Global pacing of the polling loop.
//!
//! The server allows a fixed number of protocol actions per window. Rather
//! than budgeting each channel, the whole loop is held to one tick per
//! `window / messages`: after a tick finishes early, the loop sleeps the
//! rest of the budget.

use std::time::Duration;

use twl_core::RateLimitConfig;

/// Message budget over a time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    messages: u32,
    window: Duration,
}

impl RateLimit {
    /// 800 messages per 60 seconds.
    pub const DEFAULT: RateLimit = RateLimit {
        messages: 800,
        window: Duration::from_secs(60),
    };

    /// Creates a budget; `None` when either side is zero.
    pub fn new(messages: u32, window: Duration) -> Option<Self> {
        if messages == 0 || window.is_zero() {
            return None;
        }
        Some(Self { messages, window })
    }

    /// Builds the budget from config, falling back to the default for
    /// values `ListenerConfig::validate` would reject.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.messages, Duration::from_secs(config.window_secs)).unwrap_or(Self::DEFAULT)
    }

    /// Minimum duration of one loop tick.
    pub fn tick_budget(&self) -> Duration {
        self.window / self.messages
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Computes the sleep owed after each tick and keeps totals.
#[derive(Debug, Clone)]
pub struct Pacer {
    budget: Duration,
    ticks: u64,
    paced: Duration,
}

impl Pacer {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            budget: limit.tick_budget(),
            ticks: 0,
            paced: Duration::ZERO,
        }
    }

    /// Records a finished tick that took `elapsed` and returns how long to
    /// sleep before the next one, if at all.
    pub fn delay_after(&mut self, elapsed: Duration) -> Option<Duration> {
        self.ticks += 1;
        let delay = self.budget.checked_sub(elapsed).filter(|d| !d.is_zero())?;
        self.paced += delay;
        Some(delay)
    }

    /// Ticks recorded so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Total sleep handed out so far.
    pub fn paced(&self) -> Duration {
        self.paced
    }
}
