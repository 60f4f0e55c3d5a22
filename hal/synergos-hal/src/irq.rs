//! Edge-triggered interrupt source abstractions
//!
//! Models the one thing the runtime core needs from hardware: a signal line
//! that can be told "invoke this callback on edge X". The callback side is a
//! trait object rather than a closure because it is fired from interrupt
//! context and must outlive everything that could observe it.

/// Signal edge that fires an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low-to-high transition
    Rising,
    /// High-to-low transition
    Falling,
    /// Either transition
    Any,
}

/// Receiver for edge events, invoked from interrupt context.
///
/// Implementations must tolerate being fired at an arbitrary program point,
/// including mid-execution of main-loop code.
pub trait Trigger: Sync {
    /// Deliver one edge event.
    fn fire(&self);
}

/// An input line that can deliver edge interrupts to a [`Trigger`].
///
/// Implemented by chip HALs for their interrupt-capable input pins.
pub trait InterruptInput {
    /// Arrange for `trigger.fire()` to be invoked on every matching edge.
    ///
    /// Replaces any previously attached trigger for this line.
    fn attach(&mut self, edge: Edge, trigger: &'static dyn Trigger);

    /// Stop delivering edge events for this line.
    fn detach(&mut self);
}
