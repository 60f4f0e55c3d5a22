//! Synergos Hardware Abstraction Layer
//!
//! This crate defines the seam between the board-agnostic runtime core and a
//! chip-specific HAL: the contract for raw, asynchronously-firing edge
//! signals. A chip HAL implements [`irq::InterruptInput`] for its input
//! pins; the runtime core hands it a [`irq::Trigger`] to invoke from
//! interrupt context.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application components                 │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  synergos-core (runtime logic)          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  synergos-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  chip HAL (GPIO edge interrupts)        │
//! └─────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod irq;

// Re-export key traits at crate root for convenience
pub use irq::{Edge, InterruptInput, Trigger};
