//! Token-bucket byte-rate limiter.
//!
//! The bucket holds at most one second worth of tokens and starts full.
//! Writers wait (via `tokio::time::sleep`) until enough tokens have been
//! replenished to cover their chunk.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::Result;
use crate::transfer::pipe::ByteSink;

/// Shortest wait between refill checks.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Token bucket parameterized by bytes per second.
#[derive(Debug)]
pub struct RateLimiter {
    bytes_per_sec: u64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter, or `None` when `bytes_per_sec` is zero (unlimited).
    pub fn new(bytes_per_sec: u64) -> Option<Arc<Self>> {
        if bytes_per_sec == 0 {
            return None;
        }
        Some(Arc::new(Self {
            bytes_per_sec,
            bucket: Mutex::new(Bucket {
                tokens: bytes_per_sec as f64,
                last_refill: Instant::now(),
            }),
        }))
    }

    /// Largest amount a single acquire may take at once.
    pub fn burst(&self) -> usize {
        self.bytes_per_sec.min(usize::MAX as u64) as usize
    }

    /// Wait until `bytes` tokens are available and take them.
    ///
    /// Requests larger than the bucket are served in bucket-sized pieces.
    pub async fn acquire(&self, bytes: usize) {
        let mut remaining = bytes as u64;
        while remaining > 0 {
            let take = remaining.min(self.bytes_per_sec);
            self.acquire_chunk(take as f64).await;
            remaining -= take;
        }
    }

    async fn acquire_chunk(&self, n: f64) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);
                if bucket.tokens + 1e-6 >= n {
                    bucket.tokens -= n;
                    return;
                }
                let missing = n - bucket.tokens;
                Duration::from_secs_f64(missing / self.bytes_per_sec as f64).max(MIN_WAIT)
            };
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            let cap = self.bytes_per_sec as f64;
            bucket.tokens = (bucket.tokens + elapsed * cap).min(cap);
            bucket.last_refill = now;
        }
    }
}

/// Sink wrapper that throttles writes through a [`RateLimiter`].
pub struct RateLimitedSink<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S> RateLimitedSink<S> {
    pub fn new(inner: S, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: ByteSink> ByteSink for RateLimitedSink<S> {
    async fn write(&mut self, mut chunk: Bytes) -> Result<()> {
        let burst = self.limiter.burst().max(1);
        while !chunk.is_empty() {
            let piece = chunk.split_to(chunk.len().min(burst));
            self.limiter.acquire(piece.len()).await;
            self.inner.write(piece).await?;
        }
        Ok(())
    }
}
