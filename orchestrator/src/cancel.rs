//! Cooperative cancellation shared between the Ctrl+C handler and the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Cloneable flag flipped once when the operator asks the run to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless cancelled first. Returns `false` if cancelled.
    ///
    /// A duration past the clock's range sleeps until cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    (deadline - now).min(SLEEP_SLICE)
                }
                None => SLEEP_SLICE,
            };
            thread::sleep(slice);
        }
    }
}

/// Install a Ctrl+C handler that flips `flag` instead of exiting the process.
///
/// Can only be called once per process.
pub fn install_ctrlc_handler(flag: &CancelFlag) -> Result<()> {
    let flag = flag.clone();
    ctrlc::set_handler(move || flag.cancel()).context("set Ctrl+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn sleep_returns_early_when_cancelled() {
        let flag = CancelFlag::new();
        assert!(flag.sleep(Duration::from_millis(10)));

        let remote = flag.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let started = Instant::now();
        assert!(!flag.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().expect("join");
    }

    #[test]
    fn sleep_past_clock_range_waits_for_cancel() {
        let flag = CancelFlag::new();
        let remote = flag.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        assert!(!flag.sleep(Duration::MAX));
        handle.join().expect("join");
    }
}
