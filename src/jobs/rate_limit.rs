//! # Rate Limiter
//! Sliding window over outbound image-generation requests (default 3 per 60s).
//!
//! Keeps the instants of recent requests and answers whether another one fits
//! under the quota, and how long until it would. Uses `tokio::time::Instant`
//! so paused-clock tests advance it together with `tokio::time::sleep`.

use std::{collections::VecDeque, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;

pub const DEFAULT_MAX_REQUESTS: usize = 3;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
    /// Instants of requests issued inside the window, in recording order.
    buf: Mutex<VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            buf: Mutex::new(VecDeque::new()),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn can_proceed(&self) -> bool {
        self.can_proceed_at(Instant::now())
    }

    /// Drop requests that left the window as of `now`, then report whether
    /// fewer than `max_requests` remain.
    pub fn can_proceed_at(&self, now: Instant) -> bool {
        let mut buf = self.buf.lock();
        self.prune(&mut buf, now);
        buf.len() < self.max_requests
    }

    pub fn record(&self) {
        self.record_at(Instant::now());
    }

    pub fn record_at(&self, at: Instant) {
        let mut buf = self.buf.lock();
        buf.push_back(at);
        tracing::debug!(in_window = buf.len(), "recorded image request");
    }

    /// Check and record under one lock. Returns false without recording when
    /// the window is full.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut buf = self.buf.lock();
        self.prune(&mut buf, now);
        if buf.len() >= self.max_requests {
            return false;
        }
        buf.push_back(now);
        true
    }

    pub fn time_until_available(&self) -> Duration {
        self.time_until_available_at(Instant::now())
    }

    /// Remaining window time measured from the oldest tracked request; zero
    /// while below quota or once that window has elapsed.
    pub fn time_until_available_at(&self, now: Instant) -> Duration {
        let buf = self.buf.lock();
        if buf.len() < self.max_requests {
            return Duration::ZERO;
        }
        match buf.iter().min() {
            Some(&oldest) => self
                .window
                .saturating_sub(now.saturating_duration_since(oldest)),
            None => Duration::ZERO,
        }
    }

    /// Number of tracked requests (as of the last prune).
    pub fn tracked(&self) -> usize {
        self.buf.lock().len()
    }

    fn prune(&self, buf: &mut VecDeque<Instant>, now: Instant) {
        buf.retain(|&t| now.saturating_duration_since(t) < self.window);
    }
}
