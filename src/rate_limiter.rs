//! Per-key sliding-window request limiter
//!
//! Each key keeps the instants of its accepted requests inside the current window.
//! A request is accepted while fewer than `limit` instants remain after dropping
//! those that have aged out. Entries exactly one window old have aged out, so the
//! window covers `(now - window, now]`.
//!
//! Stale keys are only trimmed when they are touched. [`SlidingWindowLimiter::start_compaction`]
//! runs a background sweep, owned by the returned [`CompactionHandle`], that drops
//! keys with no recent requests so memory stays bounded by active clients.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

type Visits = HashMap<String, VecDeque<Instant>>;

/// Shortest interval between background sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Sliding-window limiter shared by every request.
///
/// One mutex guards the whole map; the critical section is a few deque operations.
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    visits: Mutex<Visits>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            visits: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    fn lock(&self) -> MutexGuard<'_, Visits> {
        self.visits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a request for `key` now, returning whether it is within the limit
    pub fn allow(&self, key: &str) -> bool {
        let mut visits = self.lock();
        // Read the clock under the lock so each deque stays time-ordered
        let now = Instant::now();
        self.admit(&mut visits, key, now)
    }

    /// [`allow`](Self::allow) with an explicit clock.
    ///
    /// Calls for the same key must use non-decreasing instants.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut visits = self.lock();
        self.admit(&mut visits, key, now)
    }

    fn admit(&self, visits: &mut Visits, key: &str, now: Instant) -> bool {
        match visits.get_mut(key) {
            Some(seen) => {
                if let Some(cutoff) = now.checked_sub(self.window) {
                    evict_expired(seen, cutoff);
                }
                if seen.len() >= self.limit {
                    return false;
                }
                seen.push_back(now);
                true
            }
            None if self.limit == 0 => false,
            None => {
                visits.insert(key.to_string(), VecDeque::from([now]));
                true
            }
        }
    }

    /// Drop aged-out entries everywhere and forget keys left empty.
    ///
    /// Returns the number of keys removed.
    pub fn compact(&self) -> usize {
        self.compact_at(Instant::now())
    }

    /// [`compact`](Self::compact) with an explicit clock
    pub fn compact_at(&self, now: Instant) -> usize {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return 0;
        };
        let mut visits = self.lock();
        let before = visits.len();
        visits.retain(|_, seen| {
            evict_expired(seen, cutoff);
            !seen.is_empty()
        });
        before - visits.len()
    }

    /// Number of keys currently holding state
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Start a background thread that compacts every `window`.
    ///
    /// The thread holds only a weak reference, so it also ends once the limiter is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start_compaction(self: &Arc<Self>) -> io::Result<CompactionHandle> {
        let interval = self.window.max(MIN_SWEEP_INTERVAL);
        let limiter = Arc::downgrade(self);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("rate-limit-compaction".to_string())
            .spawn(move || sweep_loop(&limiter, &stop_rx, interval))?;

        info!(
            interval_ms = interval.as_millis() as u64,
            "Rate limiter compaction started"
        );
        Ok(CompactionHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

impl std::fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

fn evict_expired(seen: &mut VecDeque<Instant>, cutoff: Instant) {
    while seen.front().is_some_and(|t| *t <= cutoff) {
        seen.pop_front();
    }
}

fn sweep_loop(limiter: &Weak<SlidingWindowLimiter>, stop_rx: &mpsc::Receiver<()>, interval: Duration) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.compact();
                if removed > 0 {
                    debug!(
                        removed,
                        remaining = limiter.tracked_keys(),
                        "Rate limiter compacted"
                    );
                }
            }
            // Stop requested or handle dropped
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Rate limiter compaction stopped");
}

/// Owner of the background compaction thread.
///
/// [`stop`](Self::stop) (or dropping the handle) signals the thread and waits for it
/// to exit, so no sweep runs after it returns.
#[derive(Debug)]
pub struct CompactionHandle {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CompactionHandle {
    /// Stop the sweep and join the thread
    pub fn stop(mut self) {
        self.shutdown();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // The thread may already have exited if the limiter was dropped
            tx.send(()).ok();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!("Rate limiter compaction thread panicked");
            }
        }
    }
}

impl Drop for CompactionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
