//! Timestamp helpers shared by access tracking and lifetimes
//!
//! All timestamps in the crate are nanoseconds since the Unix epoch. The
//! returned values are strictly increasing across the whole process, so two
//! accesses never share a timestamp and recency ordering is total.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use crossbeam_utils::CachePadded;

static LAST_TIMESTAMP: CachePadded<AtomicU64> = CachePadded::new(AtomicU64::new(0));

/// Wall clock in nanoseconds since the Unix epoch
#[inline(always)]
fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

/// Strictly monotonic nanosecond timestamp
#[inline]
pub fn timestamp_nanos() -> u64 {
    let wall = wall_clock_nanos();
    let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last + 1);
        match LAST_TIMESTAMP.compare_exchange_weak(
            last,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Nanoseconds elapsed since `since_ns`, saturating at zero
#[inline(always)]
pub fn elapsed_since(since_ns: u64, now_ns: u64) -> Duration {
    Duration::from_nanos(now_ns.saturating_sub(since_ns))
}
