//! Home Assistant light service client.
//!
//! Thin wrapper over the Home Assistant REST API, translating curve output
//! into `light/turn_on` and `light/turn_off` service calls. Calls are
//! single best-effort requests with a bounded timeout; the sync engine
//! logs failures and simply retries with fresh values on the next poll, so
//! nothing here loops or escalates.

use anyhow::{Context, Result};
use serde_json::json;
use std::time::Duration;

use crate::config::Config;

/// Timeout for each light service call. Bounds how long the worker can
/// block, so a stop request is never delayed indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Transition used when restoring the default appearance.
const RESET_TRANSITION_SECS: f64 = 2.0;

/// A single derived light setting, ready to send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightCommand {
    /// Brightness 0–255; zero is a distinct "turn off".
    pub brightness: u8,
    /// Color temperature in Kelvin.
    pub kelvin: u32,
    /// Transition duration in seconds.
    pub transition: f64,
}

/// Seam between the sync engine and the light service, so engine tests can
/// record calls instead of performing HTTP.
pub trait LightController: Send {
    /// Apply a light setting. Brightness 0 turns the light off.
    fn apply(&self, command: LightCommand) -> Result<()>;

    /// Restore the light's default appearance.
    fn reset(&self) -> Result<()>;
}

/// Convert color temperature from Kelvin to mireds.
pub fn kelvin_to_mireds(kelvin: u32) -> u32 {
    (1_000_000.0 / kelvin as f64).round() as u32
}

/// REST client bound to one light entity.
pub struct HaClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
    entity_id: String,
    default_brightness: u8,
    default_kelvin: u32,
}

impl HaClient {
    /// Build a client from configuration.
    ///
    /// A missing auth token is the one fatal configuration error: without
    /// it no light call can ever succeed, so the engine must refuse to
    /// start rather than poll uselessly.
    pub fn new(config: &Config) -> Result<Self> {
        let token = config.ha_token.clone().unwrap_or_default();
        if token.trim().is_empty() {
            anyhow::bail!("ha_token is not set; add your long-lived access token to cablight.toml");
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.ha_url().trim_end_matches('/').to_string(),
            token,
            entity_id: config.entity_id(),
            default_brightness: config.default_brightness(),
            default_kelvin: config.default_color_temp(),
        })
    }

    fn call(&self, service: &str, payload: serde_json::Value) -> Result<()> {
        let endpoint = format!("{}/api/services/light/{}", self.base_url, service);
        self.http
            .post(&endpoint)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("light/{service} call failed"))?;
        Ok(())
    }
}

impl LightController for HaClient {
    fn apply(&self, command: LightCommand) -> Result<()> {
        if command.brightness == 0 {
            self.call(
                "turn_off",
                json!({
                    "entity_id": self.entity_id,
                    "transition": command.transition,
                }),
            )
        } else {
            self.call(
                "turn_on",
                json!({
                    "entity_id": self.entity_id,
                    "brightness": command.brightness,
                    "color_temp": kelvin_to_mireds(command.kelvin),
                    "transition": command.transition,
                }),
            )
        }
    }

    fn reset(&self) -> Result<()> {
        let mireds = kelvin_to_mireds(self.default_kelvin);
        self.call(
            "turn_on",
            json!({
                "entity_id": self.entity_id,
                "brightness": self.default_brightness,
                "color_temp": mireds,
                "transition": RESET_TRANSITION_SECS,
            }),
        )?;
        log_decorated!(
            "Light reset → brightness={}, {}K ({} mireds)",
            self.default_brightness,
            self.default_kelvin,
            mireds
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn kelvin_to_mireds_matches_reference_values() {
        assert_eq!(kelvin_to_mireds(4000), 250);
        assert_eq!(kelvin_to_mireds(2700), 370);
        assert_eq!(kelvin_to_mireds(2200), 455);
        assert_eq!(kelvin_to_mireds(5500), 182);
    }

    #[test]
    fn missing_token_is_a_construction_error() {
        let mut config = Config::default();
        config.ha_token = None;
        assert!(HaClient::new(&config).is_err());

        config.ha_token = Some("   ".into());
        assert!(HaClient::new(&config).is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let mut config = Config::default();
        config.ha_token = Some("token".into());
        config.ha_url = Some("http://192.168.1.10:8123/".into());

        let client = HaClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://192.168.1.10:8123");
    }
}
