//! Interrupt mutex: a non-blocking lock that defers calls instead of waiting
//!
//! A function shared by the main event loop and a hardware interrupt must
//! never have two invocations in flight at once, and interrupt context can
//! never wait. The interrupt mutex resolves both: a call that finds the
//! lock held is captured (function argument and all) into a deferred queue
//! and replayed, in arrival order, while the lock is released.
//!
//! The drain ordering is the load-bearing invariant: [`unlock`] replays the
//! queue *before* clearing the lock flag, and the queue-empty check shares
//! a critical section with the flag clear. An interrupt arriving during the
//! drain is therefore either picked up by the same drain pass or observes
//! the mutex still locked - no call is lost and none runs concurrently with
//! an in-flight replay.
//!
//! [`unlock`]: InterruptMutex::unlock

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;

use crate::config::{MutexConfig, DEFERRED_DEPTH};

/// Lock flag and deferred-call queue, updated together under one critical
/// section.
struct Flow<A> {
    locked: bool,
    deferred: Deque<A, DEFERRED_DEPTH>,
}

impl<A> Flow<A> {
    fn defer(&mut self, discard_duplicates: bool, arg: A) {
        if discard_duplicates {
            self.deferred.clear();
        }
        // Bounded queue: admit the newest call by dropping the oldest.
        if self.deferred.is_full() {
            self.deferred.pop_front();
        }
        let _ = self.deferred.push_back(arg);
    }
}

/// Non-blocking lock guarding a function shared between interrupt and
/// main-loop context.
///
/// The mutex holds no target of its own; callers pass the target to
/// [`call`](Self::call) and [`unlock`](Self::unlock). [`bind`](Self::bind)
/// packages a mutex and its target into a [`Guarded`] value, which is the
/// usual application-facing form.
pub struct InterruptMutex<A: Copy = ()> {
    flow: Mutex<CriticalSectionRawMutex, RefCell<Flow<A>>>,
    config: MutexConfig,
}

impl<A: Copy> InterruptMutex<A> {
    /// Auto-locking mutex that queues every deferred call.
    pub const fn new() -> Self {
        Self::with_config(MutexConfig::new())
    }

    /// Mutex with explicit [`MutexConfig`] behavior.
    pub const fn with_config(config: MutexConfig) -> Self {
        Self {
            flow: Mutex::new(RefCell::new(Flow {
                locked: false,
                deferred: Deque::new(),
            })),
            config,
        }
    }

    /// Package this mutex with its target into a [`Guarded`] wrapper.
    pub fn bind<F>(self, target: F) -> Guarded<F, A>
    where
        F: FnMut(A),
    {
        Guarded {
            mutex: self,
            target: Mutex::new(RefCell::new(Some(target))),
        }
    }

    /// Whether the mutex is currently locked.
    pub fn is_locked(&self) -> bool {
        self.flow.lock(|flow| flow.borrow().locked)
    }

    /// Number of calls waiting for the next drain.
    pub fn deferred(&self) -> usize {
        self.flow.lock(|flow| flow.borrow().deferred.len())
    }

    /// Lock the mutex. Calls arriving while locked are deferred.
    pub fn lock(&self) {
        self.flow.lock(|flow| flow.borrow_mut().locked = true);
    }

    /// Execute or defer one call of `target` with `arg`.
    ///
    /// Unlocked: acquires the lock, runs the target, then releases and
    /// drains - or, in manual mode, runs the target without touching the
    /// lock. Locked: captures `arg` into the deferred queue and returns
    /// immediately; the target is not entered.
    pub fn call<F>(&self, target: &mut F, arg: A)
    where
        F: FnMut(A) + ?Sized,
    {
        let run_now = self.flow.lock(|flow| {
            let mut flow = flow.borrow_mut();
            if flow.locked {
                flow.defer(self.config.discard_duplicates, arg);
                false
            } else {
                if !self.config.manual {
                    flow.locked = true;
                }
                true
            }
        });

        if run_now {
            target(arg);
            if !self.config.manual {
                self.unlock(target);
            }
        }
    }

    /// Release the mutex, first draining every deferred call in FIFO order.
    ///
    /// Calls deferred while the target replays are picked up by the same
    /// drain pass; the lock flag clears only in the critical section that
    /// observes the queue empty.
    pub fn unlock<F>(&self, target: &mut F)
    where
        F: FnMut(A) + ?Sized,
    {
        loop {
            let next = self.flow.lock(|flow| {
                let mut flow = flow.borrow_mut();
                let next = flow.deferred.pop_front();
                if next.is_none() {
                    flow.locked = false;
                }
                next
            });
            match next {
                Some(arg) => target(arg),
                None => break,
            }
        }
    }

    /// Hold the lock for the duration of `body`, draining into `target` on
    /// every exit path.
    pub fn scope<F, R>(&self, target: &mut F, body: impl FnOnce() -> R) -> R
    where
        F: FnMut(A) + ?Sized,
    {
        self.lock();
        let _release = ScopeGuard {
            mutex: self,
            target,
        };
        body()
    }
}

impl<A: Copy> Default for InterruptMutex<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Unlocks (and therefore drains) when dropped.
struct ScopeGuard<'a, A: Copy, F: FnMut(A) + ?Sized> {
    mutex: &'a InterruptMutex<A>,
    target: &'a mut F,
}

impl<A: Copy, F: FnMut(A) + ?Sized> Drop for ScopeGuard<'_, A, F> {
    fn drop(&mut self) {
        self.mutex.unlock(self.target);
    }
}

/// A target function bound to an [`InterruptMutex`].
///
/// `Guarded` is `const`-constructible and `Sync` (for `Send` targets), so
/// it can live in a `static` reachable from interrupt context. The target
/// executes *outside* the critical section: it is taken out of its cell
/// around each invocation, so interrupts stay enabled while it runs and a
/// preempting call defers by flag without ever touching the target cell.
pub struct Guarded<F, A: Copy = ()> {
    mutex: InterruptMutex<A>,
    target: Mutex<CriticalSectionRawMutex, RefCell<Option<F>>>,
}

impl<F, A> Guarded<F, A>
where
    F: FnMut(A),
    A: Copy,
{
    /// Bind `target` to a fresh auto-locking mutex.
    pub const fn new(target: F) -> Self {
        Self::with_config(target, MutexConfig::new())
    }

    /// Bind `target` to a fresh mutex with explicit behavior.
    pub const fn with_config(target: F, config: MutexConfig) -> Self {
        Self {
            mutex: InterruptMutex::with_config(config),
            target: Mutex::new(RefCell::new(Some(target))),
        }
    }

    /// Execute or defer one call (see [`InterruptMutex::call`]).
    pub fn call(&self, arg: A) {
        self.mutex.call(&mut |arg| self.run_one(arg), arg);
    }

    /// Lock the mutex. Calls arriving while locked are deferred.
    pub fn lock(&self) {
        self.mutex.lock();
    }

    /// Release the mutex, draining deferred calls into the target.
    pub fn unlock(&self) {
        self.mutex.unlock(&mut |arg| self.run_one(arg));
    }

    /// Whether the mutex is currently locked.
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }

    /// Hold the lock for the duration of `body`, draining on every exit
    /// path.
    pub fn scope<R>(&self, body: impl FnOnce() -> R) -> R {
        self.mutex
            .scope(&mut |arg| self.run_one(arg), body)
    }

    /// Run the target once with `arg`, keeping critical sections brief.
    ///
    /// The target can be absent only in manual mode, when another context
    /// is mid-invocation; the call is then deferred rather than dropped.
    fn run_one(&self, arg: A) {
        let taken = self.target.lock(|target| target.borrow_mut().take());
        match taken {
            Some(mut func) => {
                func(arg);
                self.target.lock(|target| {
                    target.borrow_mut().replace(func);
                });
            }
            None => self.mutex.flow.lock(|flow| {
                flow.borrow_mut()
                    .defer(self.mutex.config.discard_duplicates, arg);
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use heapless::Vec;

    type Log = RefCell<Vec<u32, 16>>;

    fn push(log: &Log, value: u32) {
        log.borrow_mut().push(value).unwrap();
    }

    #[test]
    fn test_unlocked_call_runs_immediately() {
        let log: Log = RefCell::new(Vec::new());
        let guard = InterruptMutex::new().bind(|x| push(&log, x));

        guard.call(7);
        assert_eq!(log.borrow().as_slice(), &[7]);
        assert!(!guard.is_locked());
    }

    #[test]
    fn test_locked_calls_drain_in_fifo_order() {
        let log: Log = RefCell::new(Vec::new());
        let guard = InterruptMutex::new().bind(|x| push(&log, x));

        guard.lock();
        guard.call(1);
        guard.call(2);
        guard.call(3);
        assert!(log.borrow().is_empty());

        guard.unlock();
        assert_eq!(log.borrow().as_slice(), &[1, 2, 3]);
        assert!(!guard.is_locked());
    }

    #[test]
    fn test_discard_duplicates_keeps_last() {
        let log: Log = RefCell::new(Vec::new());
        let config = MutexConfig {
            discard_duplicates: true,
            manual: false,
        };
        let guard = InterruptMutex::with_config(config).bind(|x| push(&log, x));

        guard.lock();
        guard.call(1);
        guard.call(2);
        guard.call(3);
        guard.unlock();
        assert_eq!(log.borrow().as_slice(), &[3]);
    }

    #[test]
    fn test_call_deferred_during_drain_still_runs() {
        let mutex: InterruptMutex<u32> = InterruptMutex::new();
        let log: Log = RefCell::new(Vec::new());

        mutex.lock();
        mutex.call(&mut |_| unreachable!("locked"), 1);
        mutex.call(&mut |_| unreachable!("locked"), 2);

        // The replay of 1 defers another call, as a preempting interrupt
        // would; it must run in the same drain pass.
        let mut target = |x: u32| {
            push(&log, x);
            if x == 1 {
                mutex.call(&mut |_| unreachable!("mutex is locked during drain"), 9);
            }
        };
        mutex.unlock(&mut target);

        assert_eq!(log.borrow().as_slice(), &[1, 2, 9]);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_manual_mode_skips_auto_lock() {
        let log: Log = RefCell::new(Vec::new());
        let config = MutexConfig {
            discard_duplicates: false,
            manual: true,
        };
        let guard = InterruptMutex::with_config(config).bind(|x| push(&log, x));

        guard.call(1);
        assert!(!guard.is_locked());

        guard.lock();
        guard.call(2);
        assert_eq!(log.borrow().as_slice(), &[1]);
        guard.unlock();
        assert_eq!(log.borrow().as_slice(), &[1, 2]);
    }

    #[test]
    fn test_scope_drains_on_exit() {
        let mutex: InterruptMutex<u32> = InterruptMutex::new();
        let log: Log = RefCell::new(Vec::new());
        let mut sink = |x: u32| push(&log, x);

        let out = mutex.scope(&mut sink, || {
            mutex.call(&mut |_| unreachable!("locked"), 4);
            assert!(mutex.is_locked());
            "done"
        });

        assert_eq!(out, "done");
        assert_eq!(log.borrow().as_slice(), &[4]);
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_overflow_keeps_newest() {
        let mutex: InterruptMutex<u32> = InterruptMutex::new();
        let log: Log = RefCell::new(Vec::new());

        mutex.lock();
        for n in 0..(DEFERRED_DEPTH as u32 + 2) {
            mutex.call(&mut |_| unreachable!("locked"), n);
        }
        assert_eq!(mutex.deferred(), DEFERRED_DEPTH);
        mutex.unlock(&mut |x| push(&log, x));

        let expected: [u32; DEFERRED_DEPTH] = [2, 3, 4, 5, 6, 7, 8, 9];
        assert_eq!(log.borrow().as_slice(), &expected);
    }
}
