//! Keyed rate limiting.
//!
//! [`KeyedLimiter`] tracks one counter per key (the gateway keys on client
//! IP) using one of two algorithms:
//!
//! - **Fixed window counter**: up to `limit` requests per `window_size`;
//!   the counter resets when the window rolls over.
//! - **Token bucket**: a bucket of `capacity` tokens, refilled by
//!   `refill_tokens` every `refill_interval`; each request consumes one.
//!
//! Idle keys are dropped by a background cleanup task once they have not
//! been seen for `ttl`. The task holds only a weak reference to the store
//! and exits when the limiter is dropped.
//!
//! Clocks use [`tokio::time::Instant`] so behavior under `tokio::time::pause`
//! is deterministic in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Algorithm and parameters for a keyed limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterAlgo {
    FixedWindowCounter {
        limit: u64,
        window_size: Duration,
    },
    TokenBucket {
        capacity: u64,
        refill_tokens: u64,
        refill_interval: Duration,
    },
}

#[derive(Debug)]
enum AlgoState {
    Window { count: u64, started_at: Instant },
    Bucket { tokens: u64, last_refill: Instant },
}

impl LimiterAlgo {
    fn fresh_state(&self, now: Instant) -> AlgoState {
        match self {
            LimiterAlgo::FixedWindowCounter { .. } => AlgoState::Window {
                count: 0,
                started_at: now,
            },
            LimiterAlgo::TokenBucket { capacity, .. } => AlgoState::Bucket {
                tokens: *capacity,
                last_refill: now,
            },
        }
    }

    fn allow(&self, state: &mut AlgoState, now: Instant) -> bool {
        match (self, state) {
            (
                LimiterAlgo::FixedWindowCounter { limit, window_size },
                AlgoState::Window { count, started_at },
            ) => {
                if !window_size.is_zero() && now.duration_since(*started_at) >= *window_size {
                    *started_at = now;
                    *count = 0;
                }
                if *count < *limit {
                    *count += 1;
                    true
                } else {
                    false
                }
            }
            (
                LimiterAlgo::TokenBucket {
                    capacity,
                    refill_tokens,
                    refill_interval,
                },
                AlgoState::Bucket {
                    tokens,
                    last_refill,
                },
            ) => {
                if !refill_interval.is_zero() {
                    let elapsed = now.duration_since(*last_refill);
                    let intervals = (elapsed.as_nanos() / refill_interval.as_nanos()) as u64;
                    if intervals > 0 {
                        let added = intervals.saturating_mul(*refill_tokens);
                        *tokens = tokens.saturating_add(added).min(*capacity);
                        // Advance the refill clock by whole intervals only, so
                        // partial progress toward the next refill is kept.
                        match u32::try_from(intervals) {
                            Ok(n) => *last_refill += *refill_interval * n,
                            Err(_) => *last_refill = now,
                        }
                    }
                }
                if *tokens > 0 {
                    *tokens -= 1;
                    true
                } else {
                    false
                }
            }
            // States are only ever created by `fresh_state` for this algo.
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Entry {
    state: AlgoState,
    last_seen: Instant,
}

/// Per-key limiter store with idle-entry expiry.
#[derive(Debug)]
pub struct KeyedLimiter {
    algo: LimiterAlgo,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl KeyedLimiter {
    /// Build a store. When both `ttl` and `cleanup_interval` are set (and
    /// non-zero) a background task prunes idle entries; it requires a
    /// running tokio runtime. Zero/absent values disable expiry.
    pub fn new(
        algo: LimiterAlgo,
        ttl: Option<Duration>,
        cleanup_interval: Option<Duration>,
    ) -> Self {
        let entries: Arc<Mutex<HashMap<String, Entry>>> = Arc::new(Mutex::new(HashMap::new()));

        let ttl = ttl.filter(|d| !d.is_zero());
        let cleanup_interval = cleanup_interval.filter(|d| !d.is_zero());
        if let (Some(ttl), Some(every)) = (ttl, cleanup_interval) {
            let store = Arc::downgrade(&entries);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.tick().await; // completes immediately
                loop {
                    ticker.tick().await;
                    let Some(entries) = store.upgrade() else { break };
                    let now = Instant::now();
                    entries
                        .lock()
                        .await
                        .retain(|_, entry| now.duration_since(entry.last_seen) <= ttl);
                }
            });
        }

        Self { algo, entries }
    }

    /// Whether `key` may proceed. Unknown keys start with fresh state.
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            state: self.algo.fresh_state(now),
            last_seen: now,
        });
        entry.last_seen = now;
        self.algo.allow(&mut entry.state, now)
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, pause};

    fn fixed_window(limit: u64, window: Duration) -> KeyedLimiter {
        KeyedLimiter::new(
            LimiterAlgo::FixedWindowCounter {
                limit,
                window_size: window,
            },
            None,
            None,
        )
    }

    fn token_bucket(capacity: u64, refill: u64, interval: Duration) -> KeyedLimiter {
        KeyedLimiter::new(
            LimiterAlgo::TokenBucket {
                capacity,
                refill_tokens: refill,
                refill_interval: interval,
            },
            None,
            None,
        )
    }

    #[tokio::test]
    async fn fixed_window_blocks_after_limit() {
        pause();
        let limiter = fixed_window(2, Duration::from_secs(10));
        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);
        // Other keys have their own window.
        assert!(limiter.allow("5.6.7.8").await);
    }

    #[tokio::test]
    async fn fixed_window_resets_after_rollover() {
        pause();
        let limiter = fixed_window(1, Duration::from_secs(10));
        assert!(limiter.allow("k").await);
        assert!(!limiter.allow("k").await);
        advance(Duration::from_secs(10)).await;
        assert!(limiter.allow("k").await);
    }

    #[tokio::test]
    async fn token_bucket_refills_up_to_capacity() {
        pause();
        let limiter = token_bucket(2, 1, Duration::from_secs(1));
        assert!(limiter.allow("k").await);
        assert!(limiter.allow("k").await);
        assert!(!limiter.allow("k").await);

        advance(Duration::from_secs(1)).await;
        assert!(limiter.allow("k").await);
        assert!(!limiter.allow("k").await);

        // A long idle period refills to capacity, not beyond.
        advance(Duration::from_secs(60)).await;
        assert!(limiter.allow("k").await);
        assert!(limiter.allow("k").await);
        assert!(!limiter.allow("k").await);
    }

    #[tokio::test]
    async fn idle_entries_are_cleaned_up() {
        pause();
        let limiter = KeyedLimiter::new(
            LimiterAlgo::FixedWindowCounter {
                limit: 1,
                window_size: Duration::from_secs(1),
            },
            Some(Duration::from_secs(2)),
            Some(Duration::from_secs(1)),
        );
        limiter.allow("k").await;
        assert_eq!(limiter.tracked_keys().await, 1);

        advance(Duration::from_secs(5)).await;
        // Give the cleanup task a chance to observe the tick.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
