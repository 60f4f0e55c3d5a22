//! Debounce gate for rate-limited invocation
//!
//! Suppresses re-entrant invocation within a cooldown window: a call that
//! arrives too soon after the last accepted one is dropped silently - not
//! queued, not retried. The recorded instant is updated *before* the
//! guarded work runs, so a slow handler cannot be re-entered by a rapid
//! repeat signal during its own execution.
//!
//! Time is injected as an [`Instant`] at the gate, which keeps the
//! primitive deterministic under test; ambient-time callers use
//! [`Instant::now`].

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};

/// Minimum-spacing gate between accepted invocations.
///
/// Shared between interrupt and main-loop context through `&self`; the
/// check-and-record is a single critical section.
pub struct Debounce {
    window: Duration,
    last: Mutex<CriticalSectionRawMutex, Cell<Option<Instant>>>,
}

impl Debounce {
    /// Create a gate with the given cooldown window.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(Cell::new(None)),
        }
    }

    /// The configured cooldown window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check the gate at time `now`.
    ///
    /// Returns `true` and records `now` if at least the window has elapsed
    /// since the last accepted call. The very first check always passes.
    pub fn ready(&self, now: Instant) -> bool {
        self.last.lock(|last| {
            let pass = match last.get() {
                None => true,
                Some(prev) => now >= prev && now.duration_since(prev) >= self.window,
            };
            if pass {
                last.set(Some(now));
            }
            pass
        })
    }
}

/// A callable paired with a [`Debounce`] gate.
///
/// Calls inside the window return `None` without invoking the inner
/// function. For delivery from interrupt context use
/// [`Listener`](crate::interrupt::Listener), which shares its gate through
/// `&self`.
pub struct Debounced<F> {
    gate: Debounce,
    func: F,
}

impl<F> Debounced<F> {
    /// Wrap `func` so that invocations are spaced at least `window` apart.
    pub const fn new(window: Duration, func: F) -> Self {
        Self {
            gate: Debounce::new(window),
            func,
        }
    }

    /// Invoke at the current time (see [`call_at`](Self::call_at)).
    pub fn call<A, R>(&mut self, arg: A) -> Option<R>
    where
        F: FnMut(A) -> R,
    {
        self.call_at(Instant::now(), arg)
    }

    /// Invoke with the event time supplied by the caller.
    ///
    /// Returns the inner function's result, or `None` if the call was
    /// dropped by the gate.
    pub fn call_at<A, R>(&mut self, now: Instant, arg: A) -> Option<R>
    where
        F: FnMut(A) -> R,
    {
        if self.gate.ready(now) {
            Some((self.func)(arg))
        } else {
            None
        }
    }

    /// The underlying gate.
    pub fn gate(&self) -> &Debounce {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_first_call_always_passes() {
        let gate = Debounce::new(Duration::from_millis(100));
        assert!(gate.ready(at(0)));
    }

    #[test]
    fn test_gate_spacing() {
        let gate = Debounce::new(Duration::from_millis(100));
        assert!(gate.ready(at(10)));
        assert!(!gate.ready(at(50)));
        assert!(!gate.ready(at(109)));
        assert!(gate.ready(at(110)));
        // Rejected calls do not reset the window
        assert!(!gate.ready(at(150)));
        assert!(gate.ready(at(210)));
    }

    #[test]
    fn test_zero_window_passes_everything() {
        let gate = Debounce::new(Duration::from_millis(0));
        assert!(gate.ready(at(5)));
        assert!(gate.ready(at(5)));
    }

    #[test]
    fn test_debounced_drops_inside_window() {
        let hits = Cell::new(0u32);
        let mut debounced =
            Debounced::new(Duration::from_millis(100), |n: u32| hits.set(hits.get() + n));

        assert_eq!(debounced.call_at(at(0), 2), Some(()));
        assert_eq!(debounced.call_at(at(50), 2), None);
        debounced.call_at(at(100), 3);
        assert_eq!(hits.get(), 5);
    }
}
