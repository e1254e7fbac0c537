//! Non-blocking admission control: token bucket and sliding window limiters

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use crate::errors::{MeshError, MeshResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    TokenBucket,
    SlidingWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub kind: LimitKind,
    pub limit: u32,
    pub window_seconds: f64,
}

impl RateLimitRule {
    pub fn token_bucket(limit: u32, window_seconds: f64) -> Self {
        Self { kind: LimitKind::TokenBucket, limit, window_seconds }
    }

    pub fn sliding_window(limit: u32, window_seconds: f64) -> Self {
        Self { kind: LimitKind::SlidingWindow, limit, window_seconds }
    }

    /// Longest accepted window, one week.
    pub const MAX_WINDOW_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.window_seconds.clamp(0.0, Self::MAX_WINDOW_SECONDS))
            .unwrap_or(Duration::ZERO)
    }

    pub fn validate(&self, exchange: &str) -> MeshResult<()> {
        if self.limit == 0 {
            return Err(MeshError::InvalidRule {
                exchange: exchange.to_string(),
                reason: "limit must be positive".to_string(),
            });
        }
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(MeshError::InvalidRule {
                exchange: exchange.to_string(),
                reason: format!("window_seconds must be positive, got {}", self.window_seconds),
            });
        }
        if self.window_seconds > Self::MAX_WINDOW_SECONDS {
            return Err(MeshError::InvalidRule {
                exchange: exchange.to_string(),
                reason: format!(
                    "window_seconds must not exceed {}, got {}",
                    Self::MAX_WINDOW_SECONDS,
                    self.window_seconds
                ),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            LimitKind::TokenBucket => "token bucket",
            LimitKind::SlidingWindow => "sliding window",
        };
        write!(f, "{} {}/{}s", kind, self.limit, self.window_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Granted,
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

/// Token bucket with continuous lazy refill.
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64, // tokens per second
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(limit: u32, window: Duration) -> Self {
        let capacity = limit as f64;
        Self {
            capacity,
            refill_rate: capacity / window.as_secs_f64(),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn acquire(&self, n: u32) -> Admission {
        self.acquire_at(n, Instant::now())
    }

    pub fn acquire_at(&self, n: u32, now: Instant) -> Admission {
        let mut state = self.state.lock();
        self.refill(&mut state, now);

        let wanted = n as f64;
        if state.tokens >= wanted {
            state.tokens -= wanted;
            Admission::Granted
        } else {
            let deficit = wanted - state.tokens;
            Admission::Denied {
                retry_after: Duration::from_secs_f64(deficit / self.refill_rate),
            }
        }
    }

    /// Returns tokens taken by an admission that was later rolled back.
    pub fn release(&self, n: u32) {
        let mut state = self.state.lock();
        state.tokens = (state.tokens + n as f64).min(self.capacity);
    }

    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now.max(state.last_refill);
    }
}

/// Counts admitted calls over a trailing window.
pub struct SlidingWindow {
    limit: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit as usize,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(limit as usize)),
        }
    }

    pub fn allow(&self) -> Admission {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&self, now: Instant) -> Admission {
        let mut admitted = self.admitted.lock();
        while let Some(&oldest) = admitted.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                admitted.pop_front();
            } else {
                break;
            }
        }

        if admitted.len() < self.limit {
            admitted.push_back(now);
            Admission::Granted
        } else {
            let oldest = admitted.front().copied().unwrap_or(now);
            Admission::Denied {
                retry_after: self.window.saturating_sub(now.saturating_duration_since(oldest)),
            }
        }
    }

    pub fn release(&self) {
        self.admitted.lock().pop_back();
    }

    pub fn in_window(&self) -> usize {
        self.admitted.lock().len()
    }
}

pub enum Limiter {
    TokenBucket(TokenBucket),
    SlidingWindow(SlidingWindow),
}

impl Limiter {
    pub fn from_rule(rule: &RateLimitRule) -> Self {
        match rule.kind {
            LimitKind::TokenBucket => Limiter::TokenBucket(TokenBucket::new(rule.limit, rule.window())),
            LimitKind::SlidingWindow => Limiter::SlidingWindow(SlidingWindow::new(rule.limit, rule.window())),
        }
    }

    pub fn try_admit(&self) -> Admission {
        match self {
            Limiter::TokenBucket(bucket) => bucket.acquire(1),
            Limiter::SlidingWindow(window) => window.allow(),
        }
    }

    pub fn rollback(&self) {
        match self {
            Limiter::TokenBucket(bucket) => bucket.release(1),
            Limiter::SlidingWindow(window) => window.release(),
        }
    }
}

/// Limiters guarding one exchange. All must admit a call for it to proceed.
pub struct LimiterSet {
    rules: Vec<RateLimitRule>,
    limiters: Vec<Limiter>,
}

impl LimiterSet {
    pub fn new(rules: &[RateLimitRule]) -> Self {
        Self {
            rules: rules.to_vec(),
            limiters: rules.iter().map(Limiter::from_rule).collect(),
        }
    }

    pub fn rules(&self) -> &[RateLimitRule] {
        &self.rules
    }

    /// Admits one call or names the first rule that denied it. Limiters that already
    /// granted are rolled back on denial so a refused call consumes nothing.
    pub fn admit(&self) -> Result<(), (&RateLimitRule, Duration)> {
        for (i, limiter) in self.limiters.iter().enumerate() {
            if let Admission::Denied { retry_after } = limiter.try_admit() {
                for granted in &self.limiters[..i] {
                    granted.rollback();
                }
                return Err((&self.rules[i], retry_after));
            }
        }
        Ok(())
    }
}
