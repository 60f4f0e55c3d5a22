//! Signal conditioning for noisy inputs
//!
//! Filters smooth sampled values over time; normalizers map raw readings
//! between working ranges. Both compose in application order with
//! `.then()`, so a potentiometer chain like "moving average, then deadband,
//! then map to 0..=100" is a single value.

pub mod filter;
pub mod normalize;

pub use filter::DigitalFilter;
pub use normalize::Normalizer;
