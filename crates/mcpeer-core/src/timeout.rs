//! Per-request deadlines with a background sweep.
//!
//! Deliberately separate from [`crate::tracker::RequestTracker`]: handlers
//! and transports that need to enforce a deadline should not need to know
//! anything about response correlation, and vice versa. The usual wiring
//! is that a timeout's `on_expire` callback calls
//! [`crate::tracker::RequestTracker::cancel`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use mcpeer_wire::RequestId;

/// The default per-request deadline, used when a caller does not specify
/// one explicitly.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A callback invoked once a deadline has elapsed.
pub type ExpireCallback = Box<dyn FnOnce(RequestId) + Send>;

struct TimeoutEntry {
    deadline: Instant,
    original_duration: Duration,
    on_expire: ExpireCallback,
}

/// Tracks per-request deadlines against a monotonic clock and sweeps
/// expired entries on demand.
#[derive(Default)]
pub struct TimeoutManager {
    entries: Mutex<HashMap<RequestId, TimeoutEntry>>,
}

impl TimeoutManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Arms a deadline `duration` from now. Overwrites any existing entry
    /// for `id`.
    pub fn arm(&self, id: RequestId, duration: Duration, on_expire: ExpireCallback) {
        let entry = TimeoutEntry {
            deadline: Instant::now() + duration,
            original_duration: duration,
            on_expire,
        };
        self.entries
            .lock()
            .expect("timeout table poisoned")
            .insert(id, entry);
    }

    /// Resets `id`'s deadline to `now + original_duration`, as called on
    /// receipt of a matching progress notification. No-op if `id` is not
    /// armed.
    pub fn reset_to_original(&self, id: &RequestId) {
        let mut table = self.entries.lock().expect("timeout table poisoned");
        if let Some(entry) = table.get_mut(id) {
            entry.deadline = Instant::now() + entry.original_duration;
        }
    }

    /// Disarms `id`'s deadline without invoking its callback.
    pub fn cancel(&self, id: &RequestId) {
        self.entries
            .lock()
            .expect("timeout table poisoned")
            .remove(id);
    }

    /// Collects and removes every entry whose deadline has elapsed, then
    /// invokes each `on_expire` callback outside the lock.
    pub fn sweep(&self) {
        let now = Instant::now();
        let expired: Vec<(RequestId, ExpireCallback)> = {
            let mut table = self.entries.lock().expect("timeout table poisoned");
            let expired_ids: Vec<RequestId> = table
                .iter()
                .filter(|(_, entry)| entry.deadline <= now)
                .map(|(id, _)| id.clone())
                .collect();
            expired_ids
                .into_iter()
                .filter_map(|id| table.remove(&id).map(|entry| (id, entry.on_expire)))
                .collect()
        };
        for (id, on_expire) in expired {
            on_expire(id);
        }
    }

    /// The number of currently armed deadlines.
    pub fn armed_count(&self) -> usize {
        self.entries.lock().expect("timeout table poisoned").len()
    }
}

/// Runs [`TimeoutManager::sweep`] on `manager` every `interval` until the
/// task is aborted. Intended to be spawned once per peer.
pub async fn run_sweeper(manager: std::sync::Arc<TimeoutManager>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        manager.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn progress_resets_deadline_to_reset_time_plus_original() {
        let manager = TimeoutManager::new();
        let id = RequestId::Number(5);
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        manager.arm(
            id.clone(),
            Duration::from_millis(50),
            Box::new(move |_| fired2.store(true, Ordering::SeqCst)),
        );

        std::thread::sleep(Duration::from_millis(30));
        manager.reset_to_original(&id);
        manager.sweep();
        assert!(!fired.load(Ordering::SeqCst), "should not fire right after reset");

        std::thread::sleep(Duration::from_millis(70));
        manager.sweep();
        assert!(fired.load(Ordering::SeqCst), "should fire after the reset deadline elapses");
    }

    #[test]
    fn cancel_disarms_without_invoking_callback() {
        let manager = TimeoutManager::new();
        let id = RequestId::Number(1);
        manager.arm(
            id.clone(),
            Duration::from_millis(1),
            Box::new(|_| panic!("must not fire")),
        );
        manager.cancel(&id);
        std::thread::sleep(Duration::from_millis(10));
        manager.sweep();
        assert_eq!(manager.armed_count(), 0);
    }

    #[test]
    fn sweep_only_fires_expired_entries() {
        let manager = TimeoutManager::new();
        let short = RequestId::Number(1);
        let long = RequestId::Number(2);
        let short_fired = Arc::new(AtomicBool::new(false));
        let long_fired = Arc::new(AtomicBool::new(false));
        let sf = short_fired.clone();
        let lf = long_fired.clone();
        manager.arm(short, Duration::from_millis(10), Box::new(move |_| sf.store(true, Ordering::SeqCst)));
        manager.arm(long, Duration::from_secs(60), Box::new(move |_| lf.store(true, Ordering::SeqCst)));

        std::thread::sleep(Duration::from_millis(30));
        manager.sweep();
        assert!(short_fired.load(Ordering::SeqCst));
        assert!(!long_fired.load(Ordering::SeqCst));
        assert_eq!(manager.armed_count(), 1);
    }
}
