//! Crawl-delay pacing for one site's network calls.
//!
//! A [`RateLimiter`] follows a begin/end timer contract: [`RateLimiter::begin`]
//! records when an operation starts and [`RateLimiter::end`] waits out
//! whatever remains of the crawl delay. Time spent inside the operation counts
//! against the delay, so a slow request incurs no extra sleep, while the starts
//! of two consecutive operations are never closer than the crawl delay.
//!
//! Every site owns its own limiter; the sitemap, category and article fetches
//! of that site all go through it.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::trace;

/// Time source used by the [`RateLimiter`].
///
/// Production code uses [`TokioClock`]; tests substitute a clock whose
/// `sleep` advances virtual time instead of blocking.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::time::Instant` and `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
pub struct RateLimiter<C = TokioClock> {
    crawl_delay: Duration,
    clock: C,
    started: Mutex<Option<Instant>>,
}

impl RateLimiter<TokioClock> {
    pub fn new(crawl_delay: Duration) -> Self {
        Self::with_clock(crawl_delay, TokioClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(crawl_delay: Duration, clock: C) -> Self {
        Self {
            crawl_delay,
            clock,
            started: Mutex::new(None),
        }
    }

    /// Record the start of a rate-limited operation.
    pub fn begin(&self) {
        let now = self.clock.now();
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
    }

    /// Wait out the remainder of the crawl delay since the matching
    /// [`begin`](Self::begin).
    ///
    /// The recorded start is consumed, so calling `end` without a fresh
    /// `begin` returns immediately.
    pub async fn end(&self) {
        let started = self
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(started) = started else {
            return;
        };

        let elapsed = self.clock.now().saturating_duration_since(started);
        let remaining = self.crawl_delay.saturating_sub(elapsed);
        if !remaining.is_zero() {
            trace!(?elapsed, ?remaining, "Pacing to crawl delay");
            self.clock.sleep(remaining).await;
        }
    }

    /// Run `op` between [`begin`](Self::begin) and [`end`](Self::end).
    ///
    /// The future is lazy, so its work starts only after `begin`.
    pub async fn limited<F, T>(&self, op: F) -> T
    where
        F: Future<Output = T>,
    {
        self.begin();
        let out = op.await;
        self.end().await;
        out
    }
}
