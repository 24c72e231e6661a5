//! Wall-clock sources
//!
//! Record timestamps are plain Unix seconds. The gateway reads its host
//! clock; the node has no valid time at boot and must be synchronized by
//! the gateway before its records mean anything. [`SyncedClock`] models
//! that: it reads 0 until [`SyncedClock::set`] installs an epoch, and it
//! exposes a waitable sync signal for the boot sequence.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of Unix-seconds timestamps
pub trait WallClock: Send + Sync {
    /// Current time in Unix seconds
    fn now(&self) -> u32;
}

/// Host system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
struct SyncPoint {
    epoch: u32,
    at: Instant,
}

/// Peer-synchronized clock for the node
///
/// Until the first [`set`](Self::set) the clock is invalid and `now()`
/// returns 0. Setting installs an epoch against a monotonic reference and
/// wakes anyone blocked in [`wait_synced`](Self::wait_synced). Later sets
/// re-synchronize (the gateway's `set_time` command may arrive at any
/// point).
#[derive(Debug, Default)]
pub struct SyncedClock {
    state: Mutex<Option<SyncPoint>>,
    synced: Condvar,
}

impl SyncedClock {
    /// Create an unsynchronized clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the wall-clock epoch received from the peer
    pub fn set(&self, epoch: u32) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = Some(SyncPoint {
            epoch,
            at: Instant::now(),
        });
        drop(state);
        self.synced.notify_all();
    }

    /// Whether a time has been installed
    pub fn is_synced(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Block until the clock is synchronized or `timeout` elapses
    ///
    /// Returns `true` when synchronized.
    pub fn wait_synced(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if state.is_some() {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            let (guard, _) = self
                .synced
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }
}

impl WallClock for SyncedClock {
    fn now(&self) -> u32 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            Some(SyncPoint { epoch, at }) => epoch.saturating_add(at.elapsed().as_secs() as u32),
            None => 0,
        }
    }
}

/// Hand-driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU32,
}

impl ManualClock {
    /// Create a clock reading `start`
    pub fn new(start: u32) -> Self {
        Self {
            secs: AtomicU32::new(start),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, secs: u32) {
        self.secs.store(secs, Ordering::Release);
    }

    /// Advance by `secs`
    pub fn advance(&self, secs: u32) {
        self.secs.fetch_add(secs, Ordering::AcqRel);
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> u32 {
        self.secs.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_synced_clock_invalid_before_set() {
        let clock = SyncedClock::new();
        assert!(!clock.is_synced());
        assert_eq!(clock.now(), 0);
    }

    #[test]
    fn test_synced_clock_set_and_read() {
        let clock = SyncedClock::new();
        clock.set(1_700_000_000);
        assert!(clock.is_synced());
        let now = clock.now();
        assert!(now >= 1_700_000_000 && now < 1_700_000_010);
    }

    #[test]
    fn test_wait_synced_timeout() {
        let clock = SyncedClock::new();
        assert!(!clock.wait_synced(Duration::from_millis(20)));
    }

    #[test]
    fn test_wait_synced_wakes_on_set() {
        let clock = Arc::new(SyncedClock::new());
        let setter = Arc::clone(&clock);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            setter.set(42);
        });
        assert!(clock.wait_synced(Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn test_resync_overwrites() {
        let clock = SyncedClock::new();
        clock.set(100);
        clock.set(5_000);
        assert!(clock.now() >= 5_000);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now(), 1000);
        clock.advance(50);
        assert_eq!(clock.now(), 1050);
        clock.set(2000);
        assert_eq!(clock.now(), 2000);
    }

    #[test]
    fn test_system_clock_is_sane() {
        // Sometime after 2023-01-01.
        assert!(SystemClock.now() > 1_672_531_200);
    }
}
