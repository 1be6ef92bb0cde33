//! Day/night light curve evaluation.
//!
//! Converts an in-game time-of-day (minutes since midnight) into bulb
//! brightness and color temperature by interpolating between ordered
//! waypoints with a cosine ease. The ease is symmetric, so dawn and dusk
//! transitions have zero velocity at each waypoint and never visibly snap.
//!
//! A [`Curve`] is immutable once constructed; swapping in an edited curve
//! means building a new one, so the sync engine never observes a
//! half-updated waypoint table.

use anyhow::Result;
use serde::Deserialize;
use std::f64::consts::PI;

use crate::constants::{MAXIMUM_KELVIN, MINIMUM_KELVIN, MINUTES_PER_DAY};

/// One anchor point on the daily light curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Waypoint {
    /// Minutes since midnight, 0–1440. A final entry at exactly 1440
    /// describes the wrap back to the first waypoint.
    pub time: u32,
    /// Bulb brightness, 0–255. Zero means "off", not "on at 0%".
    pub brightness: u8,
    /// Color temperature in Kelvin, 1000–10000.
    pub kelvin: u32,
}

impl Waypoint {
    pub const fn new(time: u32, brightness: u8, kelvin: u32) -> Self {
        Self {
            time,
            brightness,
            kelvin,
        }
    }
}

/// Built-in default curve: dim warm light at night, full cool daylight
/// between dawn (05:30–07:00) and dusk (18:00–20:00).
const DEFAULT_WAYPOINTS: [Waypoint; 6] = [
    Waypoint::new(0, 13, 2200),
    Waypoint::new(330, 13, 2200),
    Waypoint::new(420, 255, 5500),
    Waypoint::new(1080, 255, 5500),
    Waypoint::new(1200, 13, 2200),
    Waypoint::new(1440, 13, 2200),
];

/// An ordered, validated waypoint table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curve {
    waypoints: Vec<Waypoint>,
}

impl Curve {
    /// Build a curve from waypoints, validating ordering and value ranges.
    ///
    /// Requirements: at least one waypoint, times strictly ascending and at
    /// most 1440, Kelvin values within 1000–10000, and a final entry at
    /// 1440 (if present) matching the first waypoint's brightness and
    /// Kelvin so the midnight wrap is continuous.
    pub fn new(waypoints: Vec<Waypoint>) -> Result<Self> {
        if waypoints.is_empty() {
            anyhow::bail!("light curve must contain at least one waypoint");
        }

        for pair in waypoints.windows(2) {
            if pair[1].time <= pair[0].time {
                anyhow::bail!(
                    "waypoint times must be strictly ascending ({} follows {})",
                    pair[1].time,
                    pair[0].time
                );
            }
        }

        for wp in &waypoints {
            if wp.time > MINUTES_PER_DAY {
                anyhow::bail!(
                    "waypoint time {} exceeds {} minutes",
                    wp.time,
                    MINUTES_PER_DAY
                );
            }
            if !(MINIMUM_KELVIN..=MAXIMUM_KELVIN).contains(&wp.kelvin) {
                anyhow::bail!(
                    "waypoint color temperature ({} K) must be between {} and {} Kelvin",
                    wp.kelvin,
                    MINIMUM_KELVIN,
                    MAXIMUM_KELVIN
                );
            }
        }

        let first = waypoints[0];
        let last = waypoints[waypoints.len() - 1];
        if last.time == MINUTES_PER_DAY
            && (last.brightness != first.brightness || last.kelvin != first.kelvin)
        {
            anyhow::bail!(
                "waypoint at {} must match the first waypoint's brightness and Kelvin \
                 so the curve wraps continuously at midnight",
                MINUTES_PER_DAY
            );
        }

        Ok(Self { waypoints })
    }

    /// The built-in day/night curve.
    pub fn built_in() -> Self {
        Self {
            waypoints: DEFAULT_WAYPOINTS.to_vec(),
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Evaluate the curve at a time-of-day, returning `(brightness, kelvin)`.
    ///
    /// `time_minutes` is normalized modulo 1440. Within the bracketing
    /// waypoint pair, brightness and Kelvin are blended independently with
    /// a cosine ease; outside any bracket the first waypoint's values are
    /// the fallback.
    pub fn evaluate(&self, time_minutes: u32) -> (u8, u32) {
        let t = (time_minutes % MINUTES_PER_DAY) as f64;

        for pair in self.waypoints.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if (a.time as f64) <= t && t < (b.time as f64) {
                let frac = (t - a.time as f64) / ((b.time - a.time) as f64);
                let eased = smooth(frac);
                let brightness = blend(a.brightness as f64, b.brightness as f64, eased);
                let kelvin = blend(a.kelvin as f64, b.kelvin as f64, eased);
                return (brightness as u8, kelvin as u32);
            }
        }

        let first = self.waypoints[0];
        (first.brightness, first.kelvin)
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::built_in()
    }
}

/// Cosine-based smooth step: maps t ∈ [0,1] to [0,1] with ease-in/out.
///
/// Phrased as a shifted sine (identical curve, `sin(x - π/2) = -cos(x)`)
/// so the midpoint is exactly 0.5 and the endpoints exactly 0 and 1;
/// `cos(π/2)` in f64 is only approximately zero, which put midpoint
/// blends on the wrong side of `.round()`.
fn smooth(t: f64) -> f64 {
    (1.0 + ((t - 0.5) * PI).sin()) / 2.0
}

fn blend(v0: f64, v1: f64, eased: f64) -> f64 {
    (v0 + eased * (v1 - v0)).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_day_curve() -> Curve {
        Curve::new(vec![
            Waypoint::new(0, 0, 2700),
            Waypoint::new(360, 255, 5500),
            Waypoint::new(1080, 255, 5200),
            Waypoint::new(1200, 0, 2700),
            Waypoint::new(1440, 0, 2700),
        ])
        .unwrap()
    }

    #[test]
    fn evaluate_passes_through_anchors() {
        let curve = sample_day_curve();
        for wp in curve.waypoints() {
            if wp.time == MINUTES_PER_DAY {
                continue; // 1440 normalizes to 0, which is the same anchor
            }
            assert_eq!(
                curve.evaluate(wp.time),
                (wp.brightness, wp.kelvin),
                "anchor at {} minutes",
                wp.time
            );
        }
    }

    #[test]
    fn dawn_midpoint_is_eased_not_linear() {
        let curve = sample_day_curve();
        let (brightness, kelvin) = curve.evaluate(180);

        // Halfway through the bracket the cosine ease is exactly 0.5, so
        // brightness lands on the rounded midpoint.
        assert_eq!(brightness, 128);
        assert!(kelvin > 2700 && kelvin < 5500, "kelvin was {kelvin}");
    }

    #[test]
    fn ease_is_exact_at_endpoints_and_midpoint() {
        // The shifted-sine formulation must hit these exactly; an
        // approximate midpoint lands 0.5-scaled blends below `.round()`'s
        // halfway threshold.
        assert_eq!(smooth(0.0), 0.0);
        assert_eq!(smooth(0.5), 0.5);
        assert_eq!(smooth(1.0), 1.0);
    }

    #[test]
    fn quarter_points_show_the_s_shape() {
        let curve = sample_day_curve();
        let (early, _) = curve.evaluate(90);
        let (late, _) = curve.evaluate(270);

        // Ease-in: first quarter gains less than a quarter of the range;
        // ease-out mirrors it.
        assert!(early < 64, "early quarter was {early}");
        assert!(late > 191, "late quarter was {late}");
        assert_eq!(early, 255 - late);
    }

    #[test]
    fn evaluate_is_periodic() {
        let curve = sample_day_curve();
        for t in [0u32, 180, 360, 719, 1233] {
            assert_eq!(curve.evaluate(t), curve.evaluate(t + MINUTES_PER_DAY));
            assert_eq!(curve.evaluate(t), curve.evaluate(t + 3 * MINUTES_PER_DAY));
        }
    }

    #[test]
    fn time_past_last_waypoint_falls_back_to_first() {
        let curve = Curve::new(vec![
            Waypoint::new(0, 10, 2000),
            Waypoint::new(600, 200, 6000),
        ])
        .unwrap();

        // 600..1439 is outside every bracket.
        assert_eq!(curve.evaluate(600), (10, 2000));
        assert_eq!(curve.evaluate(1439), (10, 2000));
    }

    #[test]
    fn single_waypoint_curve_is_constant() {
        let curve = Curve::new(vec![Waypoint::new(0, 42, 3000)]).unwrap();
        assert_eq!(curve.evaluate(0), (42, 3000));
        assert_eq!(curve.evaluate(720), (42, 3000));
    }

    #[test]
    fn built_in_curve_has_continuous_wrap() {
        let curve = Curve::built_in();
        let first = curve.waypoints()[0];
        let last = curve.waypoints()[curve.waypoints().len() - 1];
        assert_eq!(last.time, MINUTES_PER_DAY);
        assert_eq!(last.brightness, first.brightness);
        assert_eq!(last.kelvin, first.kelvin);
    }

    #[test]
    fn rejects_empty_curve() {
        assert!(Curve::new(vec![]).is_err());
    }

    #[test]
    fn rejects_unsorted_waypoints() {
        let result = Curve::new(vec![
            Waypoint::new(0, 0, 2700),
            Waypoint::new(400, 255, 5500),
            Waypoint::new(400, 255, 5500),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_out_of_range_kelvin() {
        assert!(Curve::new(vec![Waypoint::new(0, 0, 999)]).is_err());
        assert!(Curve::new(vec![Waypoint::new(0, 0, 10001)]).is_err());
    }

    #[test]
    fn rejects_discontinuous_wrap() {
        let result = Curve::new(vec![
            Waypoint::new(0, 13, 2200),
            Waypoint::new(1440, 255, 5500),
        ]);
        assert!(result.is_err());
    }
}
