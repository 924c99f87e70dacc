//! Sliding-window admission control.
//!
//! Each service owns one [`RateWindow`] holding the timestamps of admitted
//! calls. Expired timestamps are purged lazily on every call, so the window
//! never grows past `limit` entries.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Rate limit tier for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum admissions per window
    pub limit: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 60,
            window_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Result of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was taken; the caller may proceed immediately.
    Proceed,
    /// The window is full; retry after at least this long.
    Wait(Duration),
}

/// Window occupancy, reported in status snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub used: u32,
    pub limit: u32,
    pub window_ms: u64,
    /// Time until the oldest admission leaves the window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_in_ms: Option<u64>,
}

impl RateLimitStatus {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}

/// Ordered admission timestamps for one service.
#[derive(Debug)]
pub struct RateWindow {
    config: RateLimitConfig,
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = config.limit.min(1024) as usize;
        Self {
            config,
            timestamps: VecDeque::with_capacity(capacity),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn try_acquire(&mut self) -> Admission {
        self.try_acquire_at(Instant::now())
    }

    /// Admit a call at `now` if the window has room.
    pub fn try_acquire_at(&mut self, now: Instant) -> Admission {
        self.purge(now);

        if self.timestamps.len() < self.config.limit as usize {
            self.timestamps.push_back(now);
            return Admission::Proceed;
        }

        let window = self.config.window();
        match self.timestamps.front() {
            Some(oldest) => Admission::Wait(window - now.saturating_duration_since(*oldest)),
            // limit == 0: nothing is ever admitted, wait out a full window
            None => Admission::Wait(window),
        }
    }

    pub fn usage(&self) -> RateLimitStatus {
        self.usage_at(Instant::now())
    }

    /// Occupancy at `now`, without mutating the window.
    pub fn usage_at(&self, now: Instant) -> RateLimitStatus {
        let window = self.config.window();
        let mut live = self
            .timestamps
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < window)
            .peekable();

        let resets_in_ms = live
            .peek()
            .map(|oldest| (window - now.saturating_duration_since(**oldest)).as_millis() as u64);

        RateLimitStatus {
            used: live.count() as u32,
            limit: self.config.limit,
            window_ms: self.config.window_ms,
            resets_in_ms,
        }
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    fn purge(&mut self, now: Instant) {
        let window = self.config.window();
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
