//! Application-wide constants: configuration defaults and validation bounds.

/// Default Home Assistant base URL.
pub const DEFAULT_HA_URL: &str = "http://homeassistant.local:8123";

/// Default light entity driven by the sync engine.
pub const DEFAULT_ENTITY_ID: &str = "light.cab_lamp";

/// Default seconds between telemetry polls.
pub const DEFAULT_POLL_INTERVAL: u64 = 5;

/// Default transition passed to the light service, in seconds.
pub const DEFAULT_TRANSITION_TIME: f64 = 1.0;

/// Default brightness restored on disconnect and shutdown.
pub const DEFAULT_RESET_BRIGHTNESS: u8 = 255;

/// Default color temperature restored on disconnect and shutdown, in Kelvin.
pub const DEFAULT_RESET_KELVIN: u32 = 4000;

/// Default simulated-clock start, minutes since midnight (06:00).
pub const DEFAULT_SIM_TIME_START: u32 = 360;

/// Default simulated-clock speed, game minutes per real second.
pub const DEFAULT_SIM_TIME_SPEED: f64 = 60.0;

/// Poll interval bounds in seconds.
pub const MINIMUM_POLL_INTERVAL: u64 = 1;
pub const MAXIMUM_POLL_INTERVAL: u64 = 300;

/// Transition bounds in seconds.
pub const MINIMUM_TRANSITION_TIME: f64 = 0.0;
pub const MAXIMUM_TRANSITION_TIME: f64 = 60.0;

/// Color temperature bounds in Kelvin, for waypoints and reset defaults.
pub const MINIMUM_KELVIN: u32 = 1000;
pub const MAXIMUM_KELVIN: u32 = 10000;

/// Minutes in a full game day; all times-of-day are reduced modulo this.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Poll interval used while the simulated clock is active, so accelerated
/// days render smoothly regardless of the configured interval.
pub const SIM_POLL_INTERVAL: u64 = 1;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
