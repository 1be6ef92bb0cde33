//! Property tests for curve evaluation: range preservation and
//! periodicity over arbitrary valid waypoint tables.

use proptest::prelude::*;

use cablight::curve::{Curve, Waypoint};

/// Generate a valid curve: a waypoint at 0 plus up to five more at
/// strictly ascending interior times, with in-range values.
fn curve_strategy() -> impl Strategy<Value = Curve> {
    prop::collection::btree_set(1u32..1440, 0..6).prop_flat_map(|times| {
        let count = times.len() + 1;
        prop::collection::vec((any::<u8>(), 1000u32..=10000), count).prop_map(move |values| {
            let waypoints: Vec<Waypoint> = std::iter::once(0)
                .chain(times.iter().copied())
                .zip(values.iter())
                .map(|(time, &(brightness, kelvin))| Waypoint::new(time, brightness, kelvin))
                .collect();
            Curve::new(waypoints).expect("generated waypoints are valid")
        })
    })
}

proptest! {
    /// Output stays within the waypoint value ranges for every time.
    #[test]
    fn evaluation_preserves_value_ranges(curve in curve_strategy(), t in 0u32..4320) {
        let (_brightness, kelvin) = curve.evaluate(t);
        // Brightness is a u8 by construction; check the Kelvin range.
        prop_assert!((1000..=10000).contains(&kelvin));
    }

    /// Evaluation is periodic with a 1440-minute day.
    #[test]
    fn evaluation_is_periodic(curve in curve_strategy(), t in 0u32..1440, k in 0u32..4) {
        prop_assert_eq!(curve.evaluate(t), curve.evaluate(t + k * 1440));
    }

    /// Output between two waypoints never leaves the segment's value
    /// envelope (the cosine ease is monotonic within a bracket).
    #[test]
    fn interpolation_stays_within_bracket_envelope(
        t in 0u32..360,
        (b0, b1) in (any::<u8>(), any::<u8>()),
    ) {
        let curve = Curve::new(vec![
            Waypoint::new(0, b0, 2700),
            Waypoint::new(360, b1, 5500),
        ]).unwrap();
        let (brightness, _) = curve.evaluate(t);
        let (lo, hi) = if b0 <= b1 { (b0, b1) } else { (b1, b0) };
        prop_assert!((lo..=hi).contains(&brightness));
    }
}
