//! Run-wide transfer statistics.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Thread-safe counters shared by every worker of a run.
#[derive(Debug)]
pub struct StatsAggregator {
    inner: Mutex<Counters>,
}

#[derive(Debug)]
struct Counters {
    started: Instant,
    started_at: DateTime<Utc>,
    bytes: u64,
    requests: u64,
    retries: u64,
}

/// Point-in-time view of the run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Wall time since the run started, in seconds.
    pub elapsed_seconds: f64,

    /// Total payload bytes copied by successful shard transfers.
    pub bytes: u64,

    /// Average throughput; zero when no time has elapsed.
    pub bytes_per_second: u64,

    /// Number of successfully completed shard transfers.
    pub requests: u64,

    /// Number of extra attempts spent on retries.
    pub retries: u64,
}

impl StatsAggregator {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters {
                started: Instant::now(),
                started_at: Utc::now(),
                bytes: 0,
                requests: 0,
                retries: 0,
            }),
        }
    }

    /// Record one successfully completed shard transfer.
    pub fn record_transfer(&self, bytes: u64) {
        let mut c = self.inner.lock();
        c.bytes += bytes;
        c.requests += 1;
    }

    /// Record retry attempts spent on a shard, successful or not.
    pub fn record_retry_attempts(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.inner.lock().retries += n;
    }

    /// Current totals with throughput derived from elapsed wall time.
    pub fn snapshot(&self) -> StatsReport {
        let c = self.inner.lock();
        c.report(c.started.elapsed())
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    fn report(&self, elapsed: Duration) -> StatsReport {
        let secs = elapsed.as_secs_f64();
        let bytes_per_second = if secs > 0.0 {
            (self.bytes as f64 / secs) as u64
        } else {
            0
        };

        StatsReport {
            started_at: self.started_at,
            elapsed_seconds: secs,
            bytes: self.bytes,
            bytes_per_second,
            requests: self.requests,
            retries: self.retries,
        }
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Native migration stats:")?;
        writeln!(f, "  time spent while migrating: {:.3}s;", self.elapsed_seconds)?;
        writeln!(f, "  total bytes: {};", byte_count_si(self.bytes))?;
        writeln!(f, "  bytes/s: {};", byte_count_si(self.bytes_per_second))?;
        writeln!(f, "  requests: {};", self.requests)?;
        write!(f, "  requests retries: {};", self.retries)
    }
}

/// Human-readable byte count using SI (1000-based) units.
pub fn byte_count_si(b: u64) -> String {
    const UNIT: u64 = 1000;
    if b < UNIT {
        return format!("{} B", b);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = b / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['k', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", b as f64 / div as f64, prefix)
}
