//! Gate property: for any call sequence, exactly the greedy subsequence of
//! calls spaced at least one window apart is admitted, and the first call
//! always is.

use embassy_time::{Duration, Instant};
use proptest::prelude::*;
use synergos_core::debounce::Debounce;

proptest! {
    #[test]
    fn gate_admits_greedy_spacing(gaps in prop::collection::vec(0u64..400, 1..40)) {
        let window_ms = 100u64;
        let gate = Debounce::new(Duration::from_millis(window_ms));

        let mut now = 1_000u64;
        let mut last_accepted: Option<u64> = None;
        for gap in gaps {
            now += gap;
            let expected = match last_accepted {
                None => true,
                Some(prev) => now - prev >= window_ms,
            };
            let accepted = gate.ready(Instant::from_millis(now));
            prop_assert_eq!(accepted, expected);
            if accepted {
                last_accepted = Some(now);
            }
        }
    }
}
