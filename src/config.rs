//! TOML configuration loading, defaults, and validation.
//!
//! Configuration lives in `cablight.toml` under the platform config
//! directory (e.g. `~/.config/cablight/`). Every field is optional in the
//! file and falls back to the defaults in [`crate::constants`]; a missing
//! file is created from a commented template on first run. Validation is a
//! separate pass so error messages can point at the offending value.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::curve::{Curve, Waypoint};

/// When to send a light command on a connected poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMode {
    /// Every connected poll issues a command (idempotent on the bulb).
    #[default]
    Always,
    /// Only issue a command when brightness or Kelvin changed since the
    /// last applied value, reducing network chatter.
    OnChange,
}

/// Application settings, deserialized from `cablight.toml`.
///
/// All fields are optional; accessor methods merge in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Home Assistant base URL, e.g. `http://homeassistant.local:8123`.
    pub ha_url: Option<String>,
    /// Long-lived access token. Required before the engine will start.
    pub ha_token: Option<String>,
    /// Light entity to drive, e.g. `light.cab_lamp`.
    pub entity_id: Option<String>,
    /// Seconds between telemetry polls (1-300).
    pub poll_interval: Option<u64>,
    /// Transition passed to light calls, in seconds (0-60).
    pub transition_time: Option<f64>,
    /// Brightness restored on disconnect and shutdown (0-255).
    pub default_brightness: Option<u8>,
    /// Color temperature restored on disconnect and shutdown (1000-10000 K).
    pub default_color_temp: Option<u32>,
    /// `"always"` or `"on-change"`.
    pub apply_mode: Option<ApplyMode>,
    /// Shift the game clock by the truck position's real-world UTC offset.
    pub timezone_sync: Option<bool>,
    /// Run against a simulated game clock instead of live telemetry.
    pub sim_mode: Option<bool>,
    /// Simulated clock start, minutes since midnight (0-1439).
    pub sim_time_start: Option<u32>,
    /// Simulated clock speed, game minutes per real second (> 0).
    pub sim_time_speed: Option<f64>,
    /// Custom light curve overriding the built-in default.
    #[serde(rename = "waypoint")]
    pub waypoints: Option<Vec<Waypoint>>,
}

impl Config {
    pub fn ha_url(&self) -> String {
        self.ha_url
            .clone()
            .unwrap_or_else(|| DEFAULT_HA_URL.to_string())
    }

    pub fn entity_id(&self) -> String {
        self.entity_id
            .clone()
            .unwrap_or_else(|| DEFAULT_ENTITY_ID.to_string())
    }

    pub fn poll_interval(&self) -> u64 {
        self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn transition_time(&self) -> f64 {
        self.transition_time.unwrap_or(DEFAULT_TRANSITION_TIME)
    }

    pub fn default_brightness(&self) -> u8 {
        self.default_brightness.unwrap_or(DEFAULT_RESET_BRIGHTNESS)
    }

    pub fn default_color_temp(&self) -> u32 {
        self.default_color_temp.unwrap_or(DEFAULT_RESET_KELVIN)
    }

    pub fn apply_mode(&self) -> ApplyMode {
        self.apply_mode.unwrap_or_default()
    }

    pub fn timezone_sync(&self) -> bool {
        self.timezone_sync.unwrap_or(true)
    }

    pub fn sim_mode(&self) -> bool {
        self.sim_mode.unwrap_or(false)
    }

    pub fn sim_time_start(&self) -> u32 {
        self.sim_time_start.unwrap_or(DEFAULT_SIM_TIME_START)
    }

    pub fn sim_time_speed(&self) -> f64 {
        self.sim_time_speed.unwrap_or(DEFAULT_SIM_TIME_SPEED)
    }

    /// Build the active curve: the configured waypoints, or the built-in
    /// default when none are set.
    pub fn curve(&self) -> Result<Curve> {
        match &self.waypoints {
            Some(waypoints) => {
                Curve::new(waypoints.clone()).context("invalid [[waypoint]] table")
            }
            None => Ok(Curve::built_in()),
        }
    }
}

/// Default configuration file path: `<config dir>/cablight/cablight.toml`.
pub fn get_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("could not determine the user configuration directory")?;
    Ok(base.join("cablight").join("cablight.toml"))
}

/// Load configuration from the default path, creating a commented default
/// file on first run.
pub fn load(config_dir: Option<&str>) -> Result<Config> {
    let path = match config_dir {
        Some(dir) => PathBuf::from(dir).join("cablight.toml"),
        None => get_config_path()?,
    };
    if !path.exists() {
        create_default_config(&path)?;
        log_block_start!("Created default configuration at {}", path.display());
        log_indented!("Add your Home Assistant token before starting a sync");
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit file path.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Range validation, separate from deserialization so messages can name
/// the offending value.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(interval) = config.poll_interval
        && !(MINIMUM_POLL_INTERVAL..=MAXIMUM_POLL_INTERVAL).contains(&interval)
    {
        anyhow::bail!(
            "poll_interval ({} s) must be between {} and {} seconds",
            interval,
            MINIMUM_POLL_INTERVAL,
            MAXIMUM_POLL_INTERVAL
        );
    }

    if let Some(transition) = config.transition_time
        && !(MINIMUM_TRANSITION_TIME..=MAXIMUM_TRANSITION_TIME).contains(&transition)
    {
        anyhow::bail!(
            "transition_time ({} s) must be between {} and {} seconds",
            transition,
            MINIMUM_TRANSITION_TIME,
            MAXIMUM_TRANSITION_TIME
        );
    }

    if let Some(kelvin) = config.default_color_temp
        && !(MINIMUM_KELVIN..=MAXIMUM_KELVIN).contains(&kelvin)
    {
        anyhow::bail!(
            "default_color_temp ({} K) must be between {} and {} Kelvin",
            kelvin,
            MINIMUM_KELVIN,
            MAXIMUM_KELVIN
        );
    }

    if let Some(entity_id) = &config.entity_id
        && !entity_id.starts_with("light.")
    {
        anyhow::bail!("entity_id ({}) must name a light entity (light.*)", entity_id);
    }

    if let Some(url) = &config.ha_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        anyhow::bail!("ha_url ({}) must start with http:// or https://", url);
    }

    if let Some(start) = config.sim_time_start
        && start >= MINUTES_PER_DAY
    {
        anyhow::bail!(
            "sim_time_start ({}) must be below {} minutes",
            start,
            MINUTES_PER_DAY
        );
    }

    if let Some(speed) = config.sim_time_speed
        && speed <= 0.0
    {
        anyhow::bail!("sim_time_speed ({}) must be positive", speed);
    }

    // Surface waypoint problems at load time, not at engine start.
    config.curve()?;

    Ok(())
}

/// Write the commented default template, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    Ok(())
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"#[Home Assistant]
ha_url = "http://homeassistant.local:8123"  # Base URL of your instance
ha_token = ""                # Long-lived access token (required)
entity_id = "light.cab_lamp" # Light entity to drive

#[Sync]
poll_interval = 5       # Seconds between telemetry polls (1-300)
transition_time = 1.0   # Light transition in seconds (0-60)
apply_mode = "always"   # "always" | "on-change"
timezone_sync = true    # Shift game clock by the truck's real-world timezone

#[Reset appearance]
default_brightness = 255  # Brightness restored on disconnect/shutdown (0-255)
default_color_temp = 4000 # Kelvin restored on disconnect/shutdown (1000-10000)

#[Simulation]
sim_mode = false     # Run a simulated game day without the game
sim_time_start = 360 # Simulated clock start, minutes since midnight
sim_time_speed = 60.0 # Game minutes per real second

# Custom light curve (optional). Uncomment to override the built-in
# day/night curve; times are minutes since midnight, ascending, and a
# final entry at 1440 must match the first entry.
#
# [[waypoint]]
# time = 0
# brightness = 13
# kelvin = 2200
#
# [[waypoint]]
# time = 420
# brightness = 255
# kelvin = 5500
"#;
