//! Main event loop
//!
//! One `MainLoop` instance drives the application: repeatedly invoke the
//! iteration body (blocking mode), or multiplex several cooperative tasks
//! (async mode), until an external stop signal arrives. The stop signal is
//! checked at iteration boundaries only - an iteration in progress always
//! completes - and the cleanup hook runs on every exit path, including an
//! iteration failure.

use core::fmt;
use core::future::Future;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use embassy_futures::yield_now;
use embassy_time::{block_for, Duration, Timer};

use crate::config::{SchedulerConfig, DEFAULT_DELAY_MS, MAX_TASKS};
use crate::interrupt::InterruptRegistry;

use super::tasks::{drive_all, TaskHandle};

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Scheduler run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    /// No run has started
    Idle,
    /// A run is active
    Running,
    /// The last run ended; a fresh run may start
    Stopped,
}

/// Errors from starting or executing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopError<E> {
    /// A run entrypoint was called while a run was active; the active run
    /// is unaffected
    AlreadyRunning,
    /// More tasks than [`MAX_TASKS`] were handed to the multiplexer
    TooManyTasks,
    /// The iteration body (or a task) failed; the cleanup hook has already
    /// run
    Iteration(E),
}

impl<E: fmt::Display> fmt::Display for LoopError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::AlreadyRunning => f.write_str("main loop is already running"),
            LoopError::TooManyTasks => write!(f, "more than {} tasks", MAX_TASKS),
            LoopError::Iteration(error) => write!(f, "iteration failed: {}", error),
        }
    }
}

/// Setup/cleanup hooks for one run.
///
/// Both run exactly once per run regardless of mode or task count; cleanup
/// runs on every exit path.
#[derive(Default)]
pub struct Hooks<'a> {
    /// Runs once before the first iteration
    pub setup: Option<&'a mut dyn FnMut()>,
    /// Runs once after the loop ends
    pub cleanup: Option<&'a mut dyn FnMut()>,
}

impl<'a> Hooks<'a> {
    /// No hooks.
    pub fn new() -> Self {
        Self {
            setup: None,
            cleanup: None,
        }
    }
}

/// Tuning and hooks for one blocking run.
pub struct RunOptions<'a> {
    /// Delay between iterations; zero skips the sleep
    pub delay: Duration,
    /// Lock every interrupt here around each iteration, so the body
    /// observes a consistent snapshot of interrupt-mutated state
    pub interrupts: Option<&'a InterruptRegistry>,
    /// Setup/cleanup hooks
    pub hooks: Hooks<'a>,
}

impl<'a> RunOptions<'a> {
    /// Default cadence, no interrupt locking, no hooks.
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_DELAY_MS as u64),
            interrupts: None,
            hooks: Hooks::new(),
        }
    }

    /// Build options from a stored [`SchedulerConfig`].
    ///
    /// The registry is only attached when the config asks for interrupt
    /// locking.
    pub fn from_config(config: &SchedulerConfig, interrupts: Option<&'a InterruptRegistry>) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms as u64),
            interrupts: if config.lock_interrupts {
                interrupts
            } else {
                None
            },
            hooks: Hooks::new(),
        }
    }
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// The cooperative scheduler.
///
/// `const`-constructible; applications typically keep one instance for the
/// life of the program. [`cancel`](Self::cancel) is a plain atomic store
/// and safe to call from interrupt context.
pub struct MainLoop {
    state: AtomicU8,
    cancelled: AtomicBool,
    iterations: AtomicU32,
}

impl MainLoop {
    /// A scheduler in the [`Idle`](RunState::Idle) state.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_IDLE),
            cancelled: AtomicBool::new(false),
            iterations: AtomicU32::new(0),
        }
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        match self.state.load(Ordering::Relaxed) {
            STATE_RUNNING => RunState::Running,
            STATE_STOPPED => RunState::Stopped,
            _ => RunState::Idle,
        }
    }

    /// Whether a run is active.
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Relaxed) == STATE_RUNNING
    }

    /// Iterations completed by the current (or most recent) run.
    ///
    /// In async mode this is the maximum count any one task has reached.
    pub fn iterations(&self) -> u32 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Whether a stop signal has been received for the current run.
    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Signal the current run to stop at its next iteration boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Run the blocking main loop until cancelled.
    ///
    /// `body` receives the iteration count, starting at 0. Cancellation is
    /// observed at the iteration boundary; the cleanup hook runs on every
    /// exit path, including a body error.
    pub fn run<E>(
        &self,
        mut opts: RunOptions<'_>,
        mut body: impl FnMut(u32) -> Result<(), E>,
    ) -> Result<(), LoopError<E>> {
        self.begin()?;

        if let Some(setup) = opts.hooks.setup.as_mut() {
            setup();
        }

        let result = loop {
            if self.cancelled() {
                break Ok(());
            }

            if let Some(registry) = opts.interrupts {
                registry.lock_all();
            }
            let outcome = body(self.iterations());
            if let Some(registry) = opts.interrupts {
                registry.unlock_all();
            }

            if let Err(error) = outcome {
                break Err(LoopError::Iteration(error));
            }

            let done = self.iterations.load(Ordering::Relaxed) + 1;
            self.iterations.store(done, Ordering::Relaxed);

            if !self.cancelled() && opts.delay.as_ticks() > 0 {
                block_for(opts.delay);
            }
        };

        if let Some(cleanup) = opts.hooks.cleanup.as_mut() {
            cleanup();
        }
        self.finish();
        result
    }

    /// One cooperatively-suspending task: an unbounded iteration sequence
    /// with its own inter-iteration delay.
    ///
    /// Completes with `Ok` when the loop is cancelled. A tick error cancels
    /// the loop - sibling tasks stop at their next boundary - and is
    /// returned.
    pub async fn task<E, Fut>(
        &self,
        delay: Duration,
        mut tick: impl FnMut(u32) -> Fut,
    ) -> Result<(), E>
    where
        Fut: Future<Output = Result<(), E>>,
    {
        let mut count: u32 = 0;
        loop {
            if self.cancelled() {
                return Ok(());
            }

            if let Err(error) = tick(count).await {
                self.cancel();
                return Err(error);
            }
            count += 1;
            self.bump_iterations(count);

            if delay.as_ticks() > 0 {
                Timer::after(delay).await;
            } else {
                yield_now().await;
            }
        }
    }

    /// Multiplex cooperatively-suspending tasks until every one completes.
    ///
    /// Setup/cleanup hooks run exactly once regardless of task count. Every
    /// task is driven to completion - a failing task never silently aborts
    /// a sibling mid-iteration - and the first task error is then reported.
    pub async fn run_async<E>(
        &self,
        mut hooks: Hooks<'_>,
        tasks: &mut [TaskHandle<'_, E>],
    ) -> Result<(), LoopError<E>> {
        if tasks.len() > MAX_TASKS {
            return Err(LoopError::TooManyTasks);
        }
        self.begin()?;

        if let Some(setup) = hooks.setup.as_mut() {
            setup();
        }

        let result = drive_all(tasks).await;

        if let Some(cleanup) = hooks.cleanup.as_mut() {
            cleanup();
        }
        self.finish();
        result.map_err(LoopError::Iteration)
    }

    /// Move Idle/Stopped to Running, resetting the per-run counters.
    ///
    /// Compound check-and-set under a critical section - the smallest
    /// targets have no atomic read-modify-write.
    fn begin<E>(&self) -> Result<(), LoopError<E>> {
        critical_section::with(|_| {
            if self.state.load(Ordering::Relaxed) == STATE_RUNNING {
                return Err(LoopError::AlreadyRunning);
            }
            self.state.store(STATE_RUNNING, Ordering::Relaxed);
            self.cancelled.store(false, Ordering::Relaxed);
            self.iterations.store(0, Ordering::Relaxed);
            Ok(())
        })
    }

    fn finish(&self) {
        self.state.store(STATE_STOPPED, Ordering::Release);
    }

    /// Record a task's iteration count; the global figure is the max.
    ///
    /// Tasks interleave only at suspension points, so load-then-store does
    /// not race.
    fn bump_iterations(&self, reached: u32) {
        if reached > self.iterations.load(Ordering::Relaxed) {
            self.iterations.store(reached, Ordering::Relaxed);
        }
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::future::ready;
    use core::pin::pin;

    use embassy_futures::block_on;

    #[test]
    fn test_run_counts_and_cleans_up() {
        let main_loop = MainLoop::new();
        let hits = Cell::new(0u32);
        let setups = Cell::new(0u32);
        let cleanups = Cell::new(0u32);

        let mut setup = || setups.set(setups.get() + 1);
        let mut cleanup = || cleanups.set(cleanups.get() + 1);
        let mut opts = RunOptions::new();
        opts.delay = Duration::from_millis(0);
        opts.hooks = Hooks {
            setup: Some(&mut setup),
            cleanup: Some(&mut cleanup),
        };

        let result = main_loop.run(opts, |count| {
            hits.set(hits.get() + 1);
            if count == 4 {
                main_loop.cancel();
            }
            Ok::<(), ()>(())
        });

        assert_eq!(result, Ok(()));
        assert_eq!(hits.get(), 5);
        assert_eq!(main_loop.iterations(), 5);
        assert_eq!(setups.get(), 1);
        assert_eq!(cleanups.get(), 1);
        assert_eq!(main_loop.state(), RunState::Stopped);
    }

    #[test]
    fn test_body_error_still_runs_cleanup() {
        let main_loop = MainLoop::new();
        let cleanups = Cell::new(0u32);
        let mut cleanup = || cleanups.set(cleanups.get() + 1);
        let mut opts = RunOptions::new();
        opts.delay = Duration::from_millis(0);
        opts.hooks.cleanup = Some(&mut cleanup);

        let result = main_loop.run(opts, |count| if count == 2 { Err("boom") } else { Ok(()) });

        assert_eq!(result, Err(LoopError::Iteration("boom")));
        assert_eq!(cleanups.get(), 1);
        assert_eq!(main_loop.iterations(), 2);
        assert_eq!(main_loop.state(), RunState::Stopped);
    }

    #[test]
    fn test_reentrant_run_is_rejected() {
        let main_loop = MainLoop::new();
        let nested = Cell::new(None);

        let result = main_loop.run(
            RunOptions {
                delay: Duration::from_millis(0),
                ..RunOptions::new()
            },
            |_| {
                nested.set(Some(main_loop.run(RunOptions::new(), |_| Ok::<(), ()>(()))));
                main_loop.cancel();
                Ok::<(), ()>(())
            },
        );

        assert_eq!(result, Ok(()));
        assert_eq!(nested.get(), Some(Err(LoopError::AlreadyRunning)));
        // The rejected attempt did not disturb the first run
        assert_eq!(main_loop.iterations(), 1);
    }

    #[test]
    fn test_fresh_run_after_stop() {
        let main_loop = MainLoop::new();
        let mut opts = RunOptions::new();
        opts.delay = Duration::from_millis(0);
        main_loop
            .run(opts, |count| {
                if count == 2 {
                    main_loop.cancel();
                }
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(main_loop.iterations(), 3);

        let mut opts = RunOptions::new();
        opts.delay = Duration::from_millis(0);
        main_loop
            .run(opts, |_| {
                main_loop.cancel();
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(main_loop.iterations(), 1);
    }

    #[test]
    fn test_options_from_config() {
        static REGISTRY: InterruptRegistry = InterruptRegistry::new();

        let config = SchedulerConfig {
            delay_ms: 25,
            lock_interrupts: false,
        };
        let opts = RunOptions::from_config(&config, Some(&REGISTRY));
        assert_eq!(opts.delay, Duration::from_millis(25));
        assert!(opts.interrupts.is_none());

        let config = SchedulerConfig {
            delay_ms: 25,
            lock_interrupts: true,
        };
        let opts = RunOptions::from_config(&config, Some(&REGISTRY));
        assert!(opts.interrupts.is_some());
    }

    #[test]
    fn test_run_async_multiplexes_and_counts_max() {
        let main_loop = MainLoop::new();
        let a_hits = Cell::new(0u32);
        let b_hits = Cell::new(0u32);
        let setups = Cell::new(0u32);
        let cleanups = Cell::new(0u32);

        let task_a = pin!(main_loop.task(Duration::from_millis(0), |count| {
            a_hits.set(a_hits.get() + 1);
            if count == 2 {
                main_loop.cancel();
            }
            ready(Ok::<(), ()>(()))
        }));
        let task_b = pin!(main_loop.task(Duration::from_millis(0), |_| {
            b_hits.set(b_hits.get() + 1);
            ready(Ok::<(), ()>(()))
        }));
        let mut tasks: [TaskHandle<'_, ()>; 2] = [task_a, task_b];

        let mut setup = || setups.set(setups.get() + 1);
        let mut cleanup = || cleanups.set(cleanups.get() + 1);
        let result = block_on(main_loop.run_async(
            Hooks {
                setup: Some(&mut setup),
                cleanup: Some(&mut cleanup),
            },
            &mut tasks,
        ));

        assert_eq!(result, Ok(()));
        assert_eq!(a_hits.get(), 3);
        // Task B was mid-suspension when the cancel landed; it exits at its
        // next boundary without another tick.
        assert_eq!(b_hits.get(), 2);
        assert_eq!(main_loop.iterations(), 3);
        assert_eq!(setups.get(), 1);
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn test_failing_task_cancels_siblings_and_surfaces() {
        let main_loop = MainLoop::new();
        let ok_hits = Cell::new(0u32);

        let steady = pin!(main_loop.task(Duration::from_millis(0), |_| {
            ok_hits.set(ok_hits.get() + 1);
            ready(Ok::<(), &str>(()))
        }));
        let failing = pin!(main_loop.task(Duration::from_millis(0), |count| {
            ready(if count == 1 { Err("sensor gone") } else { Ok(()) })
        }));
        let mut tasks: [TaskHandle<'_, &str>; 2] = [steady, failing];

        let result = block_on(main_loop.run_async(Hooks::new(), &mut tasks));

        assert_eq!(result, Err(LoopError::Iteration("sensor gone")));
        assert!(main_loop.cancelled());
        // The steady task finished its iteration and exited cleanly
        assert!(ok_hits.get() >= 2);
    }

    #[test]
    fn test_run_async_rejected_while_running() {
        let main_loop = MainLoop::new();
        let observed = Cell::new(None);

        let task = pin!(main_loop.task(Duration::from_millis(0), |_| {
            let attempt = main_loop.run(RunOptions::new(), |_| Ok::<(), ()>(()));
            observed.set(Some(attempt));
            main_loop.cancel();
            ready(Ok::<(), ()>(()))
        }));
        let mut tasks: [TaskHandle<'_, ()>; 1] = [task];

        block_on(main_loop.run_async(Hooks::new(), &mut tasks)).unwrap();
        assert_eq!(observed.get(), Some(Err(LoopError::AlreadyRunning)));
    }
}
