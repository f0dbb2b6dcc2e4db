//! Wall-clock deadline
//!
//! A deadline that flips a shared cancellation flag from a background
//! thread. Solvers poll the flag at every recursion, so nothing here
//! needs signals or interrupts; dropping the timer cancels it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sets `flag` once `limit` has elapsed, unless cancelled first.
pub struct Timer {
    cancelled: Arc<AtomicBool>,
}

impl Timer {
    pub fn new(limit: Duration, flag: Arc<AtomicBool>) -> Timer {
        let cancelled = Arc::new(AtomicBool::new(false));
        let watch = Arc::clone(&cancelled);
        thread::spawn(move || {
            let deadline = Instant::now() + limit;
            loop {
                if watch.load(Ordering::Relaxed) {
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::sleep(POLL_INTERVAL.min(deadline - now));
            }
            if !watch.load(Ordering::Relaxed) {
                flag.store(true, Ordering::Release);
            }
        });
        Timer { cancelled }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_deadline() {
        let flag = Arc::new(AtomicBool::new(false));
        let _timer = Timer::new(Duration::from_millis(20), Arc::clone(&flag));
        assert!(!flag.load(Ordering::Acquire));
        thread::sleep(Duration::from_millis(100));
        assert!(flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_cancelled_timer_stays_quiet() {
        let flag = Arc::new(AtomicBool::new(false));
        {
            let _timer = Timer::new(Duration::from_millis(20), Arc::clone(&flag));
            // dropped immediately: cancelled before the deadline
        }
        thread::sleep(Duration::from_millis(80));
        assert!(!flag.load(Ordering::Acquire));
    }
}
