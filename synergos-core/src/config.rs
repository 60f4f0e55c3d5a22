//! Configuration type definitions
//!
//! Plain data types describing how the runtime pieces are tuned, plus the
//! fixed capacities of the no-alloc registries and queues. Applications
//! that persist settings enable the `serde` feature and store these
//! directly.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default delay between main-loop iterations (milliseconds)
pub const DEFAULT_DELAY_MS: u32 = 100;

/// Default debounce window for interrupt listeners (milliseconds)
pub const DEFAULT_DEBOUNCE_MS: u32 = 150;

/// Default interval between cooperative socket polls (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 100;

/// Capacity of the deferred-invocation queue on each interrupt mutex
pub const DEFERRED_DEPTH: usize = 8;

/// Maximum handlers registered on one hardware interrupt
pub const MAX_HANDLERS: usize = 8;

/// Maximum hardware interrupts tracked by one registry
pub const MAX_INTERRUPTS: usize = 8;

/// Maximum tasks multiplexed by one async run
pub const MAX_TASKS: usize = 8;

/// Interrupt mutex tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MutexConfig {
    /// Keep only the most recent deferred call instead of the whole queue
    pub discard_duplicates: bool,
    /// Disable auto-locking around bound-function calls; only explicit
    /// `lock`/`unlock` apply
    pub manual: bool,
}

impl MutexConfig {
    /// Auto-locking, queue-everything configuration
    pub const fn new() -> Self {
        Self {
            discard_duplicates: false,
            manual: false,
        }
    }
}

/// Main-loop scheduler tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulerConfig {
    /// Delay between iterations in milliseconds (0 disables the sleep)
    pub delay_ms: u32,
    /// Lock every registered hardware interrupt for the duration of each
    /// iteration, so the iteration observes a consistent snapshot
    pub lock_interrupts: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            lock_interrupts: false,
        }
    }
}

/// Cooperative socket tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SocketConfig {
    /// Interval between readiness probes in milliseconds (0 yields without
    /// sleeping)
    pub poll_interval_ms: u32,
    /// Give up on a receive after this many milliseconds; `None` waits
    /// indefinitely
    pub timeout_ms: Option<u32>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: None,
        }
    }
}
