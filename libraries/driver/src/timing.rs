// Timing primitives for bit-banged protocols on a non real-time kernel

use std::time::{Duration, Instant};

use log::{debug, warn};

/// A bounded busy-poll ran out of iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinTimeout;

/// Poll `cond` until it turns false, counting the polls that returned true.
///
/// Fails once the count reaches `budget`, so a stuck line can never hang the
/// caller. No yielding happens between polls.
#[inline(always)]
pub fn spin_while(budget: u32, mut cond: impl FnMut() -> bool) -> Result<u32, SpinTimeout> {
    let mut count = 0u32;
    while cond() {
        count += 1;
        if count >= budget {
            return Err(SpinTimeout);
        }
    }
    Ok(count)
}

/// Burn CPU until `duration` has elapsed. Accurate, but only for short waits.
pub fn busy_wait(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

/// Very short settle delay, a fixed number of spin iterations
#[inline(always)]
pub fn settle(iterations: u32) {
    for _ in 0..iterations {
        std::hint::spin_loop();
    }
}

/// Highest available real-time scheduling priority for the calling thread,
/// held until dropped.
///
/// Elevation is best effort: without the needed privileges the guard is
/// still returned and the thread keeps its normal priority.
pub struct RealtimeGuard {
    elevated: bool,
}

impl RealtimeGuard {
    /// Switch the calling thread to SCHED_FIFO at maximum priority
    pub fn acquire() -> Self {
        let elevated = unsafe {
            let param = libc::sched_param {
                sched_priority: libc::sched_get_priority_max(libc::SCHED_FIFO),
            };
            libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) == 0
        };
        if elevated {
            debug!("running with SCHED_FIFO priority");
        } else {
            warn!(
                "could not raise scheduling priority: {}",
                std::io::Error::last_os_error()
            );
        }
        Self { elevated }
    }

    /// Whether the switch to real-time scheduling succeeded
    pub fn is_elevated(&self) -> bool {
        self.elevated
    }
}

impl Drop for RealtimeGuard {
    fn drop(&mut self) {
        if !self.elevated {
            return;
        }
        let restored = unsafe {
            let param = libc::sched_param { sched_priority: 0 };
            libc::sched_setscheduler(0, libc::SCHED_OTHER, &param) == 0
        };
        if !restored {
            warn!(
                "could not restore default scheduling: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spin_while_counts_true_polls() {
        let mut remaining = 5;
        let count = spin_while(100, || {
            if remaining > 0 {
                remaining -= 1;
                true
            } else {
                false
            }
        });
        assert_eq!(count, Ok(5));
        assert_eq!(spin_while(100, || false), Ok(0));
    }

    #[test]
    fn test_spin_while_times_out_at_budget() {
        let mut polls = 0;
        let result = spin_while(32000, || {
            polls += 1;
            true
        });
        assert_eq!(result, Err(SpinTimeout));
        assert_eq!(polls, 32000, "must stop exactly when the budget is reached");
    }

    #[test]
    fn test_busy_wait_duration() {
        let start = Instant::now();
        busy_wait(Duration::from_millis(5));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_realtime_guard_restores_on_drop() {
        {
            let guard = RealtimeGuard::acquire();
            let policy = unsafe { libc::sched_getscheduler(0) };
            if guard.is_elevated() {
                assert_eq!(policy, libc::SCHED_FIFO, "guard must hold real-time scheduling");
            } else {
                assert_eq!(policy, libc::SCHED_OTHER, "failed elevation leaves scheduling alone");
            }
        }
        let policy = unsafe { libc::sched_getscheduler(0) };
        assert_eq!(policy, libc::SCHED_OTHER, "default scheduling must be back after drop");
    }
}
