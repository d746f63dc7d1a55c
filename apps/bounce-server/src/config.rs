use std::str::FromStr;
use std::time::Duration;

use crate::relay::client::RelaySettings;
use crate::relay::superhub::MAX_CLIENTS;

/// Server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// How often each client connection is pinged.
    pub ping_freq: Duration,
    /// How long a single socket write may take before the connection is
    /// considered dead.
    pub write_timeout: Duration,
    /// Ceiling on a single inbound frame, in bytes.
    pub read_limit: usize,
    /// Maximum number of clients attached to one game.
    pub max_clients: usize,
}

impl Default for Config {
    fn default() -> Self {
        let relay = RelaySettings::default();
        Self {
            port: 8080,
            ping_freq: relay.ping_freq,
            write_timeout: relay.write_timeout,
            read_limit: relay.read_limit,
            max_clients: MAX_CLIENTS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything missing or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(defaults.port),
            ping_freq: parsed_var("PING_FREQ_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ping_freq),
            write_timeout: parsed_var("WRITE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.write_timeout),
            read_limit: parsed_var("READ_LIMIT_BYTES").unwrap_or(defaults.read_limit),
            max_clients: parsed_var("MAX_CLIENTS_PER_GAME").unwrap_or(defaults.max_clients),
        }
    }

    /// The per-connection tunables handed to each client actor.
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            ping_freq: self.ping_freq,
            write_timeout: self.write_timeout,
            read_limit: self.read_limit,
        }
    }
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.ping_freq, Duration::from_secs(60));
        assert_eq!(config.write_timeout, Duration::from_secs(10));
        assert_eq!(config.read_limit, 60 * 1024);
        assert_eq!(config.max_clients, 50);
    }

    #[test]
    fn relay_settings_mirror_config() {
        let config = Config {
            ping_freq: Duration::from_millis(250),
            write_timeout: Duration::from_secs(1),
            read_limit: 512,
            ..Config::default()
        };
        let relay = config.relay_settings();
        assert_eq!(relay.ping_freq, Duration::from_millis(250));
        assert_eq!(relay.write_timeout, Duration::from_secs(1));
        assert_eq!(relay.read_limit, 512);
    }
}
