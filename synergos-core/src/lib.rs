//! Board-agnostic cooperative runtime core for Synergos
//!
//! This crate contains the interrupt-safe execution core that Synergos
//! components share. Hardware interrupt callbacks can preempt main-loop
//! logic at an arbitrary point; everything here exists to let the two
//! contexts share state without a true multi-threading primitive:
//!
//! - Debounce gate for rate-limiting noisy edge events
//! - Interrupt mutex: a non-blocking lock that defers calls instead of waiting
//! - Hardware interrupt dispatch with a registered handler chain
//! - Cooperative main-loop scheduler (blocking and multiplexed async modes)
//! - Cooperative socket adapter for polling blocking transports
//! - Signal conditioning (filters and normalizers)
//! - Configuration type definitions

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod debounce;
pub mod interrupt;
pub mod mutex;
pub mod net;
pub mod scheduler;
pub mod signal;
