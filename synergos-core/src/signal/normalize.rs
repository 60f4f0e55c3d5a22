//! Range normalizers
//!
//! Map raw readings between working ranges: linearly (a potentiometer's
//! 0..=4095 onto a servo's 0..=180) or onto an exponential response curve
//! (human-perceived brightness or volume). Normalizers are stateless;
//! chain them with `.then()`.

use libm::powf;

/// Map `value` from its position in `src_range` to the corresponding
/// position in `dest_range`.
pub fn map_range(value: f32, src_range: (f32, f32), dest_range: (f32, f32)) -> f32 {
    let src_scale = src_range.1 - src_range.0;
    let fraction = (value - src_range.0) / src_scale;

    let dest_scale = dest_range.1 - dest_range.0;
    dest_scale * fraction + dest_range.0
}

/// Map a value on a linear curve to a value on an exponential curve that
/// fits within the range bounding the linear curve.
///
/// `steps` is the number of evenly-spaced data points on the curve's
/// X-axis; the curve's top end meets the top of `range`.
pub fn map_exponential(value: f32, steps: u32, range: (f32, f32)) -> f32 {
    let scale = range.1 - range.0;
    let base = powf(scale, 1.0 / steps as f32);
    let exponent = (value - range.0) / scale * steps as f32;
    powf(base, exponent) + range.0
}

/// Interface for normalizing sampled values.
pub trait Normalizer {
    /// Map one value.
    fn normalize(&self, value: f32) -> f32;

    /// Chain `self` with `next`, applying them in order.
    fn then<G>(self, next: G) -> Chain<Self, G>
    where
        Self: Sized,
        G: Normalizer,
    {
        Chain {
            first: self,
            second: next,
        }
    }
}

/// Linear mapping from a source range to a destination range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Linear {
    src_range: (f32, f32),
    dest_range: (f32, f32),
}

impl Linear {
    /// Normalizer mapping `src_range` onto `dest_range`.
    pub const fn new(src_range: (f32, f32), dest_range: (f32, f32)) -> Self {
        Self {
            src_range,
            dest_range,
        }
    }

    /// The source range sample values fall within.
    pub fn src_range(&self) -> (f32, f32) {
        self.src_range
    }

    /// The destination range normalized values are generated within.
    pub fn dest_range(&self) -> (f32, f32) {
        self.dest_range
    }
}

impl Normalizer for Linear {
    fn normalize(&self, value: f32) -> f32 {
        map_range(value, self.src_range, self.dest_range)
    }
}

/// Mapping from a linear position onto an exponential curve bounded by the
/// destination range.
///
/// The top of the curve meets the top of the destination range; the bottom
/// sits one unit above its floor (the curve passes through `base^0 = 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Exponential {
    steps: u32,
    src_range: (f32, f32),
    dest_range: (f32, f32),
}

impl Exponential {
    /// Curve with `steps` data points, mapping `src_range` onto itself.
    pub const fn new(steps: u32, src_range: (f32, f32)) -> Self {
        Self::with_dest(steps, src_range, src_range)
    }

    /// Curve with `steps` data points and a distinct destination range.
    pub const fn with_dest(steps: u32, src_range: (f32, f32), dest_range: (f32, f32)) -> Self {
        Self {
            steps,
            src_range,
            dest_range,
        }
    }

    /// The number of evenly-spaced data points on the curve's X-axis.
    pub fn steps(&self) -> u32 {
        self.steps
    }
}

impl Normalizer for Exponential {
    fn normalize(&self, value: f32) -> f32 {
        let src_scale = self.src_range.1 - self.src_range.0;
        let dest_scale = self.dest_range.1 - self.dest_range.0;

        let base = powf(dest_scale, 1.0 / self.steps as f32);
        let exponent = (value - self.src_range.0) / src_scale * self.steps as f32;
        powf(base, exponent) + self.dest_range.0
    }
}

/// Pass-through normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Identity;

impl Normalizer for Identity {
    fn normalize(&self, value: f32) -> f32 {
        value
    }
}

/// Two normalizers applied in order; build with [`Normalizer::then`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Normalizer for Chain<A, B>
where
    A: Normalizer,
    B: Normalizer,
{
    fn normalize(&self, value: f32) -> f32 {
        self.second.normalize(self.first.normalize(value))
    }
}
