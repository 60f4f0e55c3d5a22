//! Hardware interrupt dispatch
//!
//! Binds a raw asynchronous edge signal to a debounced, mutex-aware
//! dispatcher with a registered handler chain. One [`HardwareInterrupt`]
//! represents one logical signal (say, the falling edge of a button line)
//! together with the application handlers that run when it fires.
//!
//! The fire path is: raw edge -> [`Listener::fire`] -> debounce gate ->
//! interrupt mutex -> handler chain. If the scheduler (or anything else)
//! holds the instance locked, the dispatch is deferred and replayed on
//! unlock instead of interleaving with main-loop logic.

use core::cell::RefCell;
use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};
use heapless::Vec;
use synergos_hal::{Edge, InterruptInput, Trigger};

use crate::config::{DEFAULT_DEBOUNCE_MS, MAX_HANDLERS, MAX_INTERRUPTS};
use crate::debounce::Debounce;
use crate::mutex::InterruptMutex;

/// A registered interrupt handler.
///
/// Handlers take no arguments; state they touch lives in shared cells
/// reachable from both interrupt and main-loop context.
pub type Handler = fn();

/// A fixed-capacity registry rejected a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistryFull;

impl fmt::Display for RegistryFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("registry full")
    }
}

/// One logical asynchronous hardware signal and the handlers that run when
/// it fires.
///
/// `const`-constructible so instances can live in `static`s reachable from
/// interrupt context.
pub struct HardwareInterrupt {
    handlers: Mutex<CriticalSectionRawMutex, RefCell<Vec<Handler, MAX_HANDLERS>>>,
    mutex: InterruptMutex<()>,
    pending: AtomicBool,
}

impl HardwareInterrupt {
    /// Interrupt with an empty handler chain.
    pub const fn new() -> Self {
        Self {
            handlers: Mutex::new(RefCell::new(Vec::new())),
            mutex: InterruptMutex::new(),
            pending: AtomicBool::new(false),
        }
    }

    /// Interrupt with a default handler already registered.
    pub fn with_handler(handler: Handler) -> Self {
        let irq = Self::new();
        let _ = irq.register(handler);
        irq
    }

    /// Register a handler; a no-op if it is already present.
    ///
    /// Handlers run in registration order on each dispatch. A registration
    /// made from within a running handler is observed by the next dispatch,
    /// not the one in progress.
    pub fn register(&self, handler: Handler) -> Result<(), RegistryFull> {
        self.handlers.lock(|handlers| {
            let mut handlers = handlers.borrow_mut();
            if handlers.iter().any(|&known| ptr::fn_addr_eq(known, handler)) {
                return Ok(());
            }
            handlers.push(handler).map_err(|_| RegistryFull)
        })
    }

    /// Remove a handler; a no-op if it is absent.
    pub fn unregister(&self, handler: Handler) {
        self.handlers.lock(|handlers| {
            let mut handlers = handlers.borrow_mut();
            if let Some(index) = handlers
                .iter()
                .position(|&known| ptr::fn_addr_eq(known, handler))
            {
                handlers.remove(index);
            }
        });
    }

    /// Whether this interrupt has fired since [`clear_pending`].
    ///
    /// Set after the handler chain completes, so main-loop code polling the
    /// flag never races a chain in progress.
    ///
    /// [`clear_pending`]: Self::clear_pending
    pub fn pending(&self) -> bool {
        self.pending.load(Ordering::Relaxed)
    }

    /// Reset the [`pending`](Self::pending) flag.
    pub fn clear_pending(&self) {
        self.pending.store(false, Ordering::Relaxed);
    }

    /// Dispatch the handler chain through the interrupt mutex.
    ///
    /// Deferred instead of executed if the instance is locked. Normally
    /// reached via a [`Listener`]; callable directly for software-raised
    /// events.
    pub fn dispatch(&self) {
        self.mutex.call(&mut |()| self.run_chain(), ());
    }

    fn run_chain(&self) {
        self.clear_pending();
        // Snapshot under the lock; the chain itself runs with interrupts
        // enabled.
        let chain = self.handlers.lock(|handlers| handlers.borrow().clone());
        for handler in chain {
            handler();
        }
        self.pending.store(true, Ordering::Relaxed);
    }

    /// Build the low-level callback for the raw signal source, debounced
    /// with `window`.
    pub fn listener(&self, window: Duration) -> Listener<'_> {
        Listener {
            irq: self,
            gate: Debounce::new(window),
        }
    }

    /// [`listener`](Self::listener) with the default window of
    /// [`DEFAULT_DEBOUNCE_MS`].
    pub fn default_listener(&self) -> Listener<'_> {
        self.listener(Duration::from_millis(DEFAULT_DEBOUNCE_MS as u64))
    }

    /// Suspend handler delivery; incoming dispatches are deferred.
    pub fn lock(&self) {
        self.mutex.lock();
    }

    /// Resume delivery, first draining every deferred dispatch.
    pub fn unlock(&self) {
        self.mutex.unlock(&mut |()| self.run_chain());
    }

    /// Whether handler delivery is currently suspended.
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }
}

impl Default for HardwareInterrupt {
    fn default() -> Self {
        Self::new()
    }
}

/// The debounced fire path for one [`HardwareInterrupt`].
///
/// Pin a `'static` listener (e.g. with `static_cell`) and hand it to the
/// signal source via [`InterruptInput::attach`]; the source then invokes
/// [`fire`](Self::fire) from interrupt context on every matching edge.
pub struct Listener<'a> {
    irq: &'a HardwareInterrupt,
    gate: Debounce,
}

impl Listener<'_> {
    /// Deliver one edge event at the current time.
    pub fn fire(&self) {
        self.fire_at(Instant::now());
    }

    /// Deliver one edge event with the time supplied by the caller.
    ///
    /// Rapid repeats inside the debounce window are dropped; an accepted
    /// event dispatches the whole handler chain (or defers it if the
    /// interrupt is locked).
    pub fn fire_at(&self, now: Instant) {
        if self.gate.ready(now) {
            self.irq.dispatch();
        }
    }

    /// The interrupt this listener feeds.
    pub fn interrupt(&self) -> &HardwareInterrupt {
        self.irq
    }
}

impl Listener<'static> {
    /// Attach this listener to an input line's edge interrupt.
    pub fn attach(&'static self, line: &mut impl InterruptInput, edge: Edge) {
        line.attach(edge, self);
    }
}

impl Trigger for Listener<'static> {
    fn fire(&self) {
        Listener::fire(self);
    }
}

/// Lock/unlock control over one interrupt, as stored by the registry.
pub trait InterruptControl: Sync {
    /// Suspend handler delivery; dispatches are deferred.
    fn lock(&self);
    /// Resume delivery, draining deferred dispatches.
    fn unlock(&self);
}

impl InterruptControl for HardwareInterrupt {
    fn lock(&self) {
        HardwareInterrupt::lock(self);
    }

    fn unlock(&self) {
        HardwareInterrupt::unlock(self);
    }
}

/// The set of live hardware interrupts the scheduler can suspend around an
/// iteration.
///
/// An explicit value owned by the application, typically alongside its
/// [`MainLoop`](crate::scheduler::MainLoop); interrupts are added after
/// construction and removed when retired.
pub struct InterruptRegistry {
    entries: Mutex<
        CriticalSectionRawMutex,
        RefCell<Vec<&'static dyn InterruptControl, MAX_INTERRUPTS>>,
    >,
}

impl InterruptRegistry {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Track an interrupt; a no-op if it is already present.
    pub fn add(&self, irq: &'static dyn InterruptControl) -> Result<(), RegistryFull> {
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            if entries.iter().any(|&known| ptr::addr_eq(known, irq)) {
                return Ok(());
            }
            entries.push(irq).map_err(|_| RegistryFull)
        })
    }

    /// Stop tracking an interrupt; a no-op if it is absent.
    pub fn remove(&self, irq: &'static dyn InterruptControl) {
        self.entries.lock(|entries| {
            let mut entries = entries.borrow_mut();
            if let Some(index) = entries.iter().position(|&known| ptr::addr_eq(known, irq)) {
                entries.remove(index);
            }
        });
    }

    /// Number of tracked interrupts.
    pub fn len(&self) -> usize {
        self.entries.lock(|entries| entries.borrow().len())
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock every tracked interrupt, in registration order.
    pub fn lock_all(&self) {
        let snapshot = self.entries.lock(|entries| entries.borrow().clone());
        for irq in snapshot {
            irq.lock();
        }
    }

    /// Unlock every tracked interrupt, draining deferred dispatches, in
    /// registration order.
    pub fn unlock_all(&self) {
        let snapshot = self.entries.lock(|entries| entries.borrow().clone());
        for irq in snapshot {
            irq.unlock();
        }
    }
}

impl Default for InterruptRegistry {
    fn default() -> Self {
        Self::new()
    }
}
