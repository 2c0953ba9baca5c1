use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Nanoseconds since the timer's origin.
pub type Timestamp = u64;

/// `d` in nanoseconds, clamped to what a `Timestamp` can hold.
pub fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// The single clock a session reads "now" from.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> Timestamp;

    fn elapsed(&self, ts: Timestamp) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }

    fn sleep(&self, d: Duration);
}

/// Monotonic wall timer used by the live binary.
#[derive(Debug, Clone)]
pub struct MonotonicTimer {
    start: Instant,
}

impl Timer for MonotonicTimer {
    fn now(&self) -> Timestamp {
        saturating_nanos(self.start.elapsed())
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl MonotonicTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `req` is a valid timespec and a null remainder pointer is allowed.
        let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut()) };
        if rc != 0 {
            // interrupted or unsupported clock
            std::thread::sleep(duration);
        }
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer that only moves when told to. Clones share the same clock, so a
/// test can hold one handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    pub fn set(&self, ts: Timestamp) {
        self.now_ns.store(ts, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> Timestamp {
        self.now_ns.load(Ordering::SeqCst)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_clones_share_time() {
        let a = ManualTimer::new();
        let b = a.clone();
        a.advance_secs(3);
        assert_eq!(b.now(), 3_000_000_000);
        b.sleep(Duration::from_millis(500));
        assert_eq!(a.elapsed(1_000_000_000), Duration::from_millis(2_500));
    }

    #[test]
    fn elapsed_saturates_for_future_timestamps() {
        let t = ManualTimer::new();
        assert_eq!(t.elapsed(10), Duration::ZERO);
    }

    #[test]
    fn monotonic_timer_never_goes_backwards() {
        let t = MonotonicTimer::new();
        let a = t.now();
        t.sleep(Duration::from_millis(1));
        assert!(t.now() >= a + 1_000_000);
    }
}
