use crate::error::{Error, Result};
use std::{env, time::Duration};

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Field manager used for finalizer and status patches
    pub field_manager: String,

    /// Delay before re-checking an operator that is not ready yet
    pub requeue_delay: Duration,

    /// Periodic resync once every module reports done
    pub resync_interval: Duration,

    /// Timeout for outbound HTTP calls (IDE, Git server, identity provider)
    pub http_timeout: Duration,

    /// Namespace holding the global operator group
    pub operators_namespace: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            field_manager: "workshop-operator".to_string(),
            requeue_delay: Duration::from_secs(1),
            resync_interval: Duration::from_secs(300),
            http_timeout: Duration::from_secs(30),
            operators_namespace: "openshift-operators".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            field_manager: env::var("FIELD_MANAGER").unwrap_or(defaults.field_manager),
            requeue_delay: seconds_var("REQUEUE_SECONDS", defaults.requeue_delay)?,
            resync_interval: seconds_var("RESYNC_SECONDS", defaults.resync_interval)?,
            http_timeout: seconds_var("HTTP_TIMEOUT_SECONDS", defaults.http_timeout)?,
            operators_namespace: env::var("OPERATORS_NAMESPACE")
                .unwrap_or(defaults.operators_namespace),
        })
    }
}

fn seconds_var(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) => parse_seconds(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::ConfigError(format!("{key} must be a number of seconds, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("X", "5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_seconds("X", " 30 ").unwrap(), Duration::from_secs(30));
        assert!(parse_seconds("X", "2h").is_err());
    }
}
