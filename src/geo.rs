//! Truck world coordinates → timezone UTC offset.
//!
//! The ETS2 Europe map is close to an affine transform of real geography,
//! so two calibration cities (Paris and Berlin) are enough to map world
//! units to latitude/longitude. The resulting point is fed to an offline
//! point-in-polygon timezone lookup, and the zone's current UTC offset
//! (including DST) is returned in minutes so it can be added directly to
//! the in-game clock.
//!
//! Lookups are expensive relative to a poll, and a truck is slow, so
//! results are cached until the truck has moved more than
//! [`CACHE_THRESHOLD_UNITS`] from the last resolved position. Every
//! failure path degrades to UTC+0 and still caches the position, so a
//! stationary truck in open water does not re-trigger the lookup each
//! poll. `resolve` never fails.

use chrono::{Offset, Utc};
use chrono_tz::Tz;
use tzf_rs::DefaultFinder;

// Calibration from two known city positions in world space vs real
// geography:
//   Paris:  world (X=-31600, Z=-62000) → (48.8566°N, 2.3522°E)
//   Berlin: world (X= 17400, Z=-39200) → (52.5200°N, 13.4050°E)
const REF_X: f64 = -31600.0;
const REF_Z: f64 = -62000.0;
const REF_LAT: f64 = 48.8566;
const REF_LON: f64 = 2.3522;

// Less-negative Z is further north on the map, hence larger latitude.
const SCALE_LON: f64 = (13.4050 - 2.3522) / (17400.0 - -31600.0);
const SCALE_LAT: f64 = (52.5200 - 48.8566) / (-39200.0 - -62000.0);

/// Re-query distance in world units (~5 km of real-world driving at the
/// map's 1:19 scale).
pub const CACHE_THRESHOLD_UNITS: f64 = 5000.0;

/// Convert truck world coordinates to real-world (latitude, longitude).
pub fn world_to_latlon(x: f64, z: f64) -> (f64, f64) {
    let lat = REF_LAT + (z - REF_Z) * SCALE_LAT;
    let lon = REF_LON + (x - REF_X) * SCALE_LON;
    (lat, lon)
}

/// Coordinate → IANA zone lookup. A seam so tests can substitute stubs
/// for the embedded polygon database.
pub trait TimezoneLookup {
    fn timezone_at(&self, lat: f64, lon: f64) -> Option<Tz>;
}

/// Offline lookup backed by the tzf embedded timezone polygons.
pub struct TzfLookup {
    finder: DefaultFinder,
}

impl TzfLookup {
    pub fn new() -> Self {
        Self {
            finder: DefaultFinder::new(),
        }
    }
}

impl Default for TzfLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl TimezoneLookup for TzfLookup {
    fn timezone_at(&self, lat: f64, lon: f64) -> Option<Tz> {
        let name = self.finder.get_tz_name(lon, lat);
        if name.is_empty() {
            return None;
        }
        name.parse().ok()
    }
}

struct ResolvedZone {
    x: f64,
    z: f64,
    tz: Option<Tz>,
    offset_minutes: i32,
}

/// Resolver owning the lookup and the distance-keyed cache.
///
/// Single-writer: only the sync worker calls `resolve`, so no internal
/// synchronization is needed.
pub struct GeoResolver {
    lookup: Box<dyn TimezoneLookup + Send>,
    cache: Option<ResolvedZone>,
}

impl GeoResolver {
    pub fn new() -> Self {
        Self::with_lookup(Box::new(TzfLookup::new()))
    }

    pub fn with_lookup(lookup: Box<dyn TimezoneLookup + Send>) -> Self {
        Self {
            lookup,
            cache: None,
        }
    }

    /// Resolve `(utc_offset_minutes, zone)` for a truck position.
    ///
    /// NaN coordinates return `(0, None)` without touching the cache.
    /// Positions within [`CACHE_THRESHOLD_UNITS`] of the last resolution
    /// return the cached tuple without consulting the lookup.
    pub fn resolve(&mut self, x: f64, z: f64) -> (i32, Option<Tz>) {
        if x.is_nan() || z.is_nan() {
            return (0, None);
        }

        if let Some(cached) = &self.cache
            && (x - cached.x).hypot(z - cached.z) < CACHE_THRESHOLD_UNITS
        {
            return (cached.offset_minutes, cached.tz);
        }

        let (lat, lon) = world_to_latlon(x, z);
        let lat = lat.clamp(-90.0, 90.0);
        let lon = lon.clamp(-180.0, 180.0);

        let (offset_minutes, tz) = match self.lookup.timezone_at(lat, lon) {
            Some(tz) => {
                let offset = utc_offset_minutes(tz);
                log_debug!(
                    "Timezone {} (UTC{:+}) for lat={:.4} lon={:.4}",
                    tz,
                    offset / 60,
                    lat,
                    lon
                );
                (offset, Some(tz))
            }
            None => {
                log_debug!("No timezone for lat={:.4} lon={:.4}, using UTC+0", lat, lon);
                (0, None)
            }
        };

        // Cache misses too, so a borderline position is not re-queried
        // every poll.
        self.cache = Some(ResolvedZone {
            x,
            z,
            tz,
            offset_minutes,
        });
        (offset_minutes, tz)
    }

    /// Clear all cached state. Called on every fresh game connect so the
    /// next resolution is not suppressed by a previous session's position.
    pub fn reset(&mut self) {
        self.cache = None;
    }
}

impl Default for GeoResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Current UTC offset of a zone in minutes, including DST.
fn utc_offset_minutes(tz: Tz) -> i32 {
    Utc::now()
        .with_timezone(&tz)
        .offset()
        .fix()
        .local_minus_utc()
        / 60
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Option<Tz>);

    impl TimezoneLookup for FixedLookup {
        fn timezone_at(&self, _lat: f64, _lon: f64) -> Option<Tz> {
            self.0
        }
    }

    struct PanickingLookup;

    impl TimezoneLookup for PanickingLookup {
        fn timezone_at(&self, _lat: f64, _lon: f64) -> Option<Tz> {
            panic!("lookup must not be consulted");
        }
    }

    /// Fixed-offset zone so assertions do not depend on the current date.
    /// Etc/GMT signs are POSIX-inverted: Etc/GMT-2 is UTC+2.
    fn utc_plus_2() -> Tz {
        "Etc/GMT-2".parse().unwrap()
    }

    #[test]
    fn calibration_maps_paris_to_paris() {
        let (lat, lon) = world_to_latlon(-31600.0, -62000.0);
        assert!((lat - 48.8566).abs() < 1e-9);
        assert!((lon - 2.3522).abs() < 1e-9);
    }

    #[test]
    fn calibration_maps_berlin_to_berlin() {
        let (lat, lon) = world_to_latlon(17400.0, -39200.0);
        assert!((lat - 52.5200).abs() < 1e-9);
        assert!((lon - 13.4050).abs() < 1e-9);
    }

    #[test]
    fn nan_coordinates_bypass_cache_and_return_utc() {
        let mut resolver = GeoResolver::with_lookup(Box::new(PanickingLookup));
        assert_eq!(resolver.resolve(f64::NAN, 5.0), (0, None));
        assert_eq!(resolver.resolve(5.0, f64::NAN), (0, None));
        assert!(resolver.cache.is_none());
    }

    #[test]
    fn resolution_returns_zone_offset() {
        let mut resolver = GeoResolver::with_lookup(Box::new(FixedLookup(Some(utc_plus_2()))));
        let (offset, tz) = resolver.resolve(0.0, 0.0);
        assert_eq!(offset, 120);
        assert_eq!(tz, Some(utc_plus_2()));
    }

    #[test]
    fn nearby_position_short_circuits_the_lookup() {
        let mut resolver = GeoResolver::with_lookup(Box::new(FixedLookup(Some(utc_plus_2()))));
        let first = resolver.resolve(1000.0, 1000.0);

        // Swap in a lookup that would blow up if consulted; a position
        // inside the threshold must come straight from the cache.
        resolver.lookup = Box::new(PanickingLookup);
        let second = resolver.resolve(1000.0 + 3000.0, 1000.0 + 3000.0);
        assert_eq!(first, second);
    }

    #[test]
    fn distant_position_triggers_a_fresh_lookup() {
        let mut resolver = GeoResolver::with_lookup(Box::new(FixedLookup(Some(utc_plus_2()))));
        resolver.resolve(0.0, 0.0);

        resolver.lookup = Box::new(FixedLookup(Some("Etc/GMT-5".parse().unwrap())));
        let (offset, _) = resolver.resolve(CACHE_THRESHOLD_UNITS * 2.0, 0.0);
        assert_eq!(offset, 300);
    }

    #[test]
    fn failed_lookup_degrades_to_utc_and_caches_position() {
        let mut resolver = GeoResolver::with_lookup(Box::new(FixedLookup(None)));
        assert_eq!(resolver.resolve(0.0, 0.0), (0, None));

        // The miss is cached: the next nearby poll must not consult again.
        resolver.lookup = Box::new(PanickingLookup);
        assert_eq!(resolver.resolve(10.0, 10.0), (0, None));
    }

    #[test]
    fn reset_forces_the_next_resolution() {
        let mut resolver = GeoResolver::with_lookup(Box::new(FixedLookup(Some(utc_plus_2()))));
        resolver.resolve(0.0, 0.0);
        resolver.reset();

        resolver.lookup = Box::new(FixedLookup(Some("Etc/GMT-1".parse().unwrap())));
        let (offset, _) = resolver.resolve(0.0, 0.0);
        assert_eq!(offset, 60);
    }
}
