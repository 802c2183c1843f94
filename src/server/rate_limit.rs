//! Per-address fixed-window limiter.
//!
//! State lives in this process only. A recycled instance starts with empty
//! windows, and separate instances do not share counts.

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitKind {
    Write,
    Read,
}

impl RateLimitKind {
    /// Body sent with a 429.
    pub fn rejection_message(self) -> &'static str {
        match self {
            RateLimitKind::Write => "Too many attempts. Please try again later.",
            RateLimitKind::Read => "Too many requests. Please try again later.",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    /// `POST /add-leads`: 20 per 10 minutes.
    pub const WRITE: Self = Self {
        max_requests: 20,
        window: Duration::from_secs(10 * 60),
    };

    /// `GET /get-leads`: 100 per 15 minutes.
    pub const READ: Self = Self {
        max_requests: 100,
        window: Duration::from_secs(15 * 60),
    };
}

/// Outcome of one hit, with the numbers the rate-limit headers need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
    pub window: Duration,
}

pub struct RateLimiter {
    kind: RateLimitKind,
    windows: DashMap<String, Window>,
    limits: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(kind: RateLimitKind, limits: RateLimitConfig) -> Self {
        Self {
            kind,
            windows: DashMap::new(),
            limits,
        }
    }

    pub fn kind(&self) -> RateLimitKind {
        self.kind
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Count one hit for `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let RateLimitConfig {
            max_requests,
            window,
        } = self.limits;

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window::open(now));
        if entry.is_expired(now, window) {
            *entry = Window::open(now);
        }
        entry.hits = entry.hits.saturating_add(1);
        entry.last_seen = now;

        RateLimitDecision {
            allowed: entry.hits <= max_requests,
            limit: max_requests,
            remaining: max_requests.saturating_sub(entry.hits),
            reset_after: (entry.started + window).saturating_duration_since(now),
            window,
        }
    }

    /// Drop windows that have expired and seen no traffic for `max_idle`.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        self.prune_idle_at(max_idle, Instant::now())
    }

    fn prune_idle_at(&self, max_idle: Duration, now: Instant) -> usize {
        if max_idle.is_zero() {
            return 0;
        }
        let window = self.limits.window;
        let before = self.windows.len();
        self.windows.retain(|_, entry| {
            !(entry.is_expired(now, window) && now.duration_since(entry.last_seen) >= max_idle)
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[derive(Clone, Debug)]
struct Window {
    started: Instant,
    last_seen: Instant,
    hits: u32,
}

impl Window {
    fn open(now: Instant) -> Self {
        Self {
            started: now,
            last_seen: now,
            hits: 0,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.started) >= window
    }
}
