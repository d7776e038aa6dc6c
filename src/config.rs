// Fetch configuration: refresh interval and the three remote endpoints

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub base_url: String,
    pub token: String,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    // Refresh interval of the countdown; also bounds price cache freshness
    pub countdown_seconds: u64,
    pub timeout_ms: u64,
    pub airport: Endpoint,
    pub geocode: Endpoint,
    pub ride: Endpoint,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: 60,
            timeout_ms: 10_000,
            airport: Endpoint::new("https://airport.api.aero/airport/match", ""),
            geocode: Endpoint::new("https://maps.googleapis.com/maps/api/geocode/json", ""),
            ride: Endpoint::new("https://api.uber.com/v1", ""),
        }
    }
}

impl FetchConfig {
    /// Defaults overlaid with whatever is set in the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("RIDE_COMPARE_COUNTDOWN_SECONDS") {
            config.countdown_seconds = parse_positive("RIDE_COMPARE_COUNTDOWN_SECONDS", value)?;
        }
        if let Some(value) = lookup("RIDE_COMPARE_TIMEOUT_MS") {
            config.timeout_ms = parse_positive("RIDE_COMPARE_TIMEOUT_MS", value)?;
        }

        let overlays: [(&str, &mut String); 6] = [
            ("AIRPORT_API_URL", &mut config.airport.base_url),
            ("AIRPORT_API_KEY", &mut config.airport.token),
            ("GEOCODE_API_URL", &mut config.geocode.base_url),
            ("GEOCODE_API_KEY", &mut config.geocode.token),
            ("RIDE_API_URL", &mut config.ride.base_url),
            ("RIDE_API_TOKEN", &mut config.ride.token),
        ];
        for (key, slot) in overlays {
            if let Some(value) = lookup(key) {
                *slot = value;
            }
        }

        Ok(config)
    }
}

fn parse_positive(key: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}
