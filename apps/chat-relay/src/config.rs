use std::time::Duration;

use crate::error::ConfigError;
use crate::gateway::origin::AllowedOrigin;

/// Chat relay configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Host/port pairs a websocket `Origin` header must match.
    pub allowed_origins: Vec<AllowedOrigin>,
    /// Messages buffered per connection before it is treated as a slow consumer.
    pub outbound_queue_capacity: usize,
    /// Largest inbound websocket message accepted, in bytes.
    pub max_message_bytes: usize,
    /// Interval between keepalive pings sent to each client.
    pub keepalive_interval: Duration,
    /// A client that sends nothing (not even a pong) for this long is dropped.
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9091,
            allowed_origins: vec![
                AllowedOrigin::new("localhost", 9091),
                AllowedOrigin::new("localhost", 19001),
            ],
            outbound_queue_capacity: 256,
            max_message_bytes: 64 * 1024,
            keepalive_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// [`Config::default`] for anything unset.
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from `lookup`, which maps a variable name to its value.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let allowed_origins = match lookup("ALLOWED_ORIGINS") {
            Some(raw) => parse_allowed_origins(&raw)?,
            None => defaults.allowed_origins,
        };

        let outbound_queue_capacity = parsed_var(&lookup, "OUTBOUND_QUEUE_CAPACITY")?
            .unwrap_or(defaults.outbound_queue_capacity);
        let keepalive_secs = parsed_var(&lookup, "KEEPALIVE_INTERVAL_SECS")?
            .unwrap_or(defaults.keepalive_interval.as_secs());
        let idle_secs =
            parsed_var(&lookup, "IDLE_TIMEOUT_SECS")?.unwrap_or(defaults.idle_timeout.as_secs());

        Ok(Self {
            port: parsed_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            allowed_origins,
            outbound_queue_capacity: nonzero("OUTBOUND_QUEUE_CAPACITY", outbound_queue_capacity)?,
            max_message_bytes: parsed_var(&lookup, "MAX_MESSAGE_BYTES")?
                .unwrap_or(defaults.max_message_bytes),
            keepalive_interval: Duration::from_secs(nonzero(
                "KEEPALIVE_INTERVAL_SECS",
                keepalive_secs,
            )?),
            idle_timeout: Duration::from_secs(nonzero("IDLE_TIMEOUT_SECS", idle_secs)?),
        })
    }
}

/// Parse a comma-separated `host:port` list such as
/// `localhost:9091,localhost:19001`. Blank entries are skipped.
pub fn parse_allowed_origins(raw: &str) -> Result<Vec<AllowedOrigin>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidOrigin(entry.to_string());
            let (host, port) = entry.rsplit_once(':').ok_or_else(invalid)?;
            if host.is_empty() {
                return Err(invalid());
            }
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            Ok(AllowedOrigin::new(host, port))
        })
        .collect()
}

fn parsed_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}

/// Reject a zero count or period.
fn nonzero<T>(name: &'static str, value: T) -> Result<T, ConfigError>
where
    T: Default + PartialEq + ToString,
{
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_local_dev_origins() {
        let config = Config::default();
        assert_eq!(config.port, 9091);
        assert!(config
            .allowed_origins
            .contains(&AllowedOrigin::new("localhost", 9091)));
        assert!(config
            .allowed_origins
            .contains(&AllowedOrigin::new("localhost", 19001)));
        assert!(config.outbound_queue_capacity > 0);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    fn assert_invalid(result: Result<Config, ConfigError>, expected: &str) {
        match result {
            Err(ConfigError::Invalid { name, value }) => {
                assert_eq!(name, expected);
                assert_eq!(value, "0");
            }
            other => panic!("Expected {expected} to be rejected, got: {other:?}"),
        }
    }

    #[test]
    fn unset_vars_fall_back_to_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        let defaults = Config::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.allowed_origins, defaults.allowed_origins);
        assert_eq!(config.keepalive_interval, defaults.keepalive_interval);
        assert_eq!(config.idle_timeout, defaults.idle_timeout);
    }

    #[test]
    fn vars_override_defaults() {
        let config = Config::from_vars(vars(&[
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "chat.example.com:443"),
            ("OUTBOUND_QUEUE_CAPACITY", "8"),
            ("KEEPALIVE_INTERVAL_SECS", " 5 "),
            ("IDLE_TIMEOUT_SECS", "15"),
            ("MAX_MESSAGE_BYTES", ""),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.allowed_origins,
            vec![AllowedOrigin::new("chat.example.com", 443)]
        );
        assert_eq!(config.outbound_queue_capacity, 8);
        assert_eq!(config.keepalive_interval, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(15));
        assert_eq!(config.max_message_bytes, Config::default().max_message_bytes);
    }

    #[test]
    fn unparseable_var_is_rejected() {
        let err = Config::from_vars(vars(&[("PORT", "ninety")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        assert_invalid(
            Config::from_vars(vars(&[("OUTBOUND_QUEUE_CAPACITY", "0")])),
            "OUTBOUND_QUEUE_CAPACITY",
        );
    }

    #[test]
    fn zero_keepalive_interval_is_rejected() {
        assert_invalid(
            Config::from_vars(vars(&[("KEEPALIVE_INTERVAL_SECS", "0")])),
            "KEEPALIVE_INTERVAL_SECS",
        );
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        assert_invalid(
            Config::from_vars(vars(&[("IDLE_TIMEOUT_SECS", "0")])),
            "IDLE_TIMEOUT_SECS",
        );
    }

    #[test]
    fn parse_allowed_origins_trims_and_skips_blanks() {
        let parsed = parse_allowed_origins(" chat.example.com:443 , ,localhost:8080,").unwrap();
        assert_eq!(
            parsed,
            vec![
                AllowedOrigin::new("chat.example.com", 443),
                AllowedOrigin::new("localhost", 8080),
            ]
        );
    }

    #[test]
    fn parse_allowed_origins_rejects_missing_port() {
        let err = parse_allowed_origins("localhost").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOrigin(ref e) if e == "localhost"));
    }

    #[test]
    fn parse_allowed_origins_rejects_bad_port_and_empty_host() {
        assert!(parse_allowed_origins("localhost:http").is_err());
        assert!(parse_allowed_origins("localhost:70000").is_err());
        assert!(parse_allowed_origins(":9091").is_err());
    }
}
