//! Runtime configuration for dicefeed.
//!
//! Built once at startup from flags, an optional YAML document, or both,
//! then passed around by reference and never mutated.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_graphite_addr() -> String {
    "localhost".to_string()
}

fn default_graphite_port() -> u16 {
    2003
}

fn default_server_id() -> String {
    "sv01".to_string()
}

fn default_site_count() -> usize {
    50
}

fn default_interval_seconds() -> u64 {
    60
}

#[derive(thiserror::Error, Debug, Clone, Copy)]
/// Errors produced by [`Config`] validation.
pub enum Error {
    /// The tick interval is zero
    #[error("interval must be greater than zero")]
    ZeroInterval,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
/// Main configuration struct for this program.
pub struct Config {
    /// Hostname or IP of the graphite ingest endpoint
    #[serde(default = "default_graphite_addr")]
    pub graphite_addr: String,
    /// TCP port of the graphite ingest endpoint
    #[serde(default = "default_graphite_port")]
    pub graphite_port: u16,
    /// Server identity embedded in every metric name
    #[serde(default = "default_server_id")]
    pub server_id: String,
    /// Number of synthetic sites sampled on every tick
    #[serde(default = "default_site_count")]
    pub site_count: usize,
    /// Tick period and alignment unit, in seconds
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graphite_addr: default_graphite_addr(),
            graphite_port: default_graphite_port(),
            server_id: default_server_id(),
            site_count: default_site_count(),
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl Config {
    /// The tick interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Check for values that cannot drive the feed loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroInterval`] if the tick interval is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.interval_seconds == 0 {
            return Err(Error::ZeroInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Error};

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = serde_yaml::from_str("{}").expect("defaults must deserialize");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_document_keeps_remaining_defaults() {
        let config: Config = serde_yaml::from_str("server_id: sv02\ngraphite_port: 2004\n")
            .expect("document must deserialize");

        assert_eq!(config.server_id, "sv02");
        assert_eq!(config.graphite_port, 2004);
        assert_eq!(config.graphite_addr, "localhost");
        assert_eq!(config.site_count, 50);
        assert_eq!(config.interval_seconds, 60);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Config, _> = serde_yaml::from_str("graphite_password: hunter2\n");
        assert!(result.is_err());
    }

    #[test]
    fn zero_interval_fails_validation() {
        let config = Config {
            interval_seconds: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::ZeroInterval)));
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().expect("defaults must validate");
    }
}
