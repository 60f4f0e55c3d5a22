//! Digital filters
//!
//! Stateful, sample-at-a-time filters for jittery analog readings. Each
//! filter remembers its most recent output, so main-loop code can re-read
//! the settled value without feeding a new sample.

use heapless::HistoryBuffer;

/// Number of samples in the moving-average window
pub const MA_WINDOW: usize = 10;

/// Interface for filtering sampled digital values.
pub trait DigitalFilter {
    /// Feed one sample; returns the filtered value.
    fn filter(&mut self, sample: f32) -> f32;

    /// The most recent filtered value, if any sample has been seen.
    fn value(&self) -> Option<f32>;

    /// Chain `self` with `next`, applying them in order.
    fn then<G>(self, next: G) -> Chain<Self, G>
    where
        Self: Sized,
        G: DigitalFilter,
    {
        Chain {
            first: self,
            second: next,
        }
    }
}

/// Mean of the last [`MA_WINDOW`] samples.
pub struct MovingAverage {
    window: HistoryBuffer<f32, MA_WINDOW>,
    value: Option<f32>,
}

impl MovingAverage {
    /// An empty window.
    pub fn new() -> Self {
        Self {
            window: HistoryBuffer::new(),
            value: None,
        }
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalFilter for MovingAverage {
    fn filter(&mut self, sample: f32) -> f32 {
        self.window.write(sample);
        let sum: f32 = self.window.oldest_ordered().copied().sum();
        let mean = sum / self.window.len() as f32;
        self.value = Some(mean);
        mean
    }

    fn value(&self) -> Option<f32> {
        self.value
    }
}

/// Exponential moving average (low-pass).
///
/// `alpha * new + (1 - alpha) * old`; the first sample passes through.
pub struct ExpMovingAverage {
    alpha: f32,
    value: Option<f32>,
}

impl ExpMovingAverage {
    /// Default smoothing factor
    pub const DEFAULT_ALPHA: f32 = 0.1;

    /// Filter with the default smoothing factor.
    pub fn new() -> Self {
        Self::with_alpha(Self::DEFAULT_ALPHA)
    }

    /// `alpha` is the weight of each new sample, in `0.0..=1.0`; smaller
    /// values smooth harder.
    pub fn with_alpha(alpha: f32) -> Self {
        Self { alpha, value: None }
    }
}

impl Default for ExpMovingAverage {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalFilter for ExpMovingAverage {
    fn filter(&mut self, sample: f32) -> f32 {
        let next = match self.value {
            None => sample,
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    fn value(&self) -> Option<f32> {
        self.value
    }
}

/// Deadband (low-pass): holds its output until the input moves more than
/// the band away from the held value.
///
/// An optional apply-range bounds where filtering happens; samples outside
/// the range always pass through. Useful at the ends of a potentiometer's
/// travel, where the extremes must remain reachable.
pub struct Deadband {
    band: f32,
    range: (f32, f32),
    value: Option<f32>,
}

impl Deadband {
    /// Default band size
    pub const DEFAULT_BAND: f32 = 10.0;

    /// Deadband filter applied over the whole input range.
    pub fn new(band: f32) -> Self {
        Self::with_range(band, (f32::NEG_INFINITY, f32::INFINITY))
    }

    /// Deadband filter applied only inside `range`.
    pub fn with_range(band: f32, range: (f32, f32)) -> Self {
        Self {
            band,
            range,
            value: None,
        }
    }
}

impl Default for Deadband {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BAND)
    }
}

impl DigitalFilter for Deadband {
    fn filter(&mut self, sample: f32) -> f32 {
        let outside = sample < self.range.0 || sample > self.range.1;
        let step = match self.value {
            Some(held) => {
                let delta = sample - held;
                if delta < 0.0 {
                    -delta
                } else {
                    delta
                }
            }
            None => f32::INFINITY,
        };

        if outside || step > self.band {
            self.value = Some(sample);
        }
        // Inside the band: hold the previous value
        self.value.unwrap_or(sample)
    }

    fn value(&self) -> Option<f32> {
        self.value
    }
}

/// Pass-through filter.
#[derive(Default)]
pub struct Identity {
    value: Option<f32>,
}

impl Identity {
    /// A fresh pass-through filter.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DigitalFilter for Identity {
    fn filter(&mut self, sample: f32) -> f32 {
        self.value = Some(sample);
        sample
    }

    fn value(&self) -> Option<f32> {
        self.value
    }
}

/// Two filters applied in order; build with [`DigitalFilter::then`].
///
/// Chains nest, so any number of stages compose without allocation.
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> DigitalFilter for Chain<A, B>
where
    A: DigitalFilter,
    B: DigitalFilter,
{
    fn filter(&mut self, sample: f32) -> f32 {
        let intermediate = self.first.filter(sample);
        self.second.filter(intermediate)
    }

    fn value(&self) -> Option<f32> {
        self.second.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_windows() {
        let mut filter = MovingAverage::new();
        assert_eq!(filter.value(), None);
        assert_eq!(filter.filter(10.0), 10.0);
        assert_eq!(filter.filter(20.0), 15.0);
        assert_eq!(filter.filter(30.0), 20.0);

        // Fill past the window; only the last MA_WINDOW samples count
        for _ in 0..MA_WINDOW {
            filter.filter(50.0);
        }
        assert_eq!(filter.filter(50.0), 50.0);
        assert_eq!(filter.value(), Some(50.0));
    }

    #[test]
    fn test_ema_first_sample_passes_through() {
        let mut filter = ExpMovingAverage::with_alpha(0.5);
        assert_eq!(filter.filter(40.0), 40.0);
        assert_eq!(filter.filter(0.0), 20.0);
        assert_eq!(filter.filter(20.0), 20.0);
    }

    #[test]
    fn test_deadband_holds_and_releases() {
        let mut filter = Deadband::new(10.0);
        assert_eq!(filter.filter(100.0), 100.0);
        // Wiggle inside the band is held
        assert_eq!(filter.filter(105.0), 100.0);
        assert_eq!(filter.filter(91.0), 100.0);
        // A real move passes and re-anchors the band
        assert_eq!(filter.filter(111.0), 111.0);
        assert_eq!(filter.filter(103.0), 111.0);
    }

    #[test]
    fn test_deadband_bypassed_outside_apply_range() {
        let mut filter = Deadband::with_range(10.0, (10.0, 90.0));
        assert_eq!(filter.filter(50.0), 50.0);
        assert_eq!(filter.filter(55.0), 50.0);
        // Near the rail the filter steps aside so extremes stay reachable
        assert_eq!(filter.filter(95.0), 95.0);
        assert_eq!(filter.filter(96.0), 96.0);
    }

    #[test]
    fn test_chain_applies_in_order() {
        let mut chain = Identity::new().then(ExpMovingAverage::with_alpha(0.5));
        assert_eq!(chain.filter(8.0), 8.0);
        assert_eq!(chain.filter(0.0), 4.0);
        assert_eq!(chain.value(), Some(4.0));
    }
}
