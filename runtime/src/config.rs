//! Runtime configuration.
//!
//! Defaults suit an interactive client. Every field can be overridden from
//! the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `ENTITY_SYNC_REQUEST_TIMEOUT_MS` | [`SyncConfig::request_timeout`] |
//! | `ENTITY_SYNC_BROADCAST_CAPACITY` | [`SyncConfig::broadcast_capacity`] |
//! | `ENTITY_SYNC_PUSH_CAPACITY` | [`SyncConfig::push_capacity`] |
//! | `ENTITY_SYNC_SHUTDOWN_TIMEOUT_MS` | [`SyncConfig::shutdown_timeout`] |

use entity_sync_core::environment::SyncEnvironment;
use entity_sync_core::transport::Correlator;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Store and correlator tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How long a correlated call waits before reporting a timeout
    pub request_timeout: Duration,
    /// Actions buffered per slow action observer
    pub broadcast_capacity: usize,
    /// Pushes buffered per slow push subscriber
    pub push_capacity: usize,
    /// Default wait for in-flight effects on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: SyncEnvironment::DEFAULT_REQUEST_TIMEOUT,
            broadcast_capacity: 64,
            push_capacity: Correlator::DEFAULT_PUSH_CAPACITY,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// Load configuration from `ENTITY_SYNC_*` variables, falling back to
    /// defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to something unparseable
    /// or the result fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse(&lookup, "ENTITY_SYNC_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = parse(&lookup, "ENTITY_SYNC_BROADCAST_CAPACITY")? {
            config.broadcast_capacity = capacity;
        }
        if let Some(capacity) = parse(&lookup, "ENTITY_SYNC_PUSH_CAPACITY")? {
            config.push_capacity = capacity;
        }
        if let Some(ms) = parse(&lookup, "ENTITY_SYNC_SHUTDOWN_TIMEOUT_MS")? {
            config.shutdown_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the push buffer capacity
    #[must_use]
    pub const fn with_push_capacity(mut self, capacity: usize) -> Self {
        self.push_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Check the configuration for values the runtime cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for zero timeouts or capacities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation("request timeout must be non-zero".into()));
        }
        if self.broadcast_capacity == 0 || self.push_capacity == 0 {
            return Err(ConfigError::Validation("channel capacities must be non-zero".into()));
        }
        Ok(())
    }

    /// Environment over `correlator` carrying this configuration's request
    /// timeout.
    #[must_use]
    pub fn environment(&self, correlator: std::sync::Arc<Correlator>) -> SyncEnvironment {
        SyncEnvironment::new(correlator).with_request_timeout(self.request_timeout)
    }
}

fn parse<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        assert_eq!(SyncConfig::from_lookup(lookup(&[])), Ok(SyncConfig::default()));
    }

    #[test]
    fn variables_override_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("ENTITY_SYNC_REQUEST_TIMEOUT_MS", "1500"),
            ("ENTITY_SYNC_BROADCAST_CAPACITY", " 8 "),
        ]));

        assert_eq!(
            config,
            Ok(SyncConfig::default()
                .with_request_timeout(Duration::from_millis(1500))
                .with_broadcast_capacity(8))
        );
    }

    #[test]
    fn unparseable_values_are_rejected() {
        let result = SyncConfig::from_lookup(lookup(&[("ENTITY_SYNC_PUSH_CAPACITY", "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                var: "ENTITY_SYNC_PUSH_CAPACITY",
                ..
            })
        ));
    }

    #[test]
    fn zero_timeouts_fail_validation() {
        let result = SyncConfig::from_lookup(lookup(&[("ENTITY_SYNC_REQUEST_TIMEOUT_MS", "0")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    proptest::proptest! {
        #[test]
        fn any_positive_timeout_is_accepted(ms in 1u64..86_400_000, capacity in 1usize..4096) {
            let ms_text = ms.to_string();
            let capacity_text = capacity.to_string();
            let config = SyncConfig::from_lookup(lookup(&[
                ("ENTITY_SYNC_REQUEST_TIMEOUT_MS", ms_text.as_str()),
                ("ENTITY_SYNC_PUSH_CAPACITY", capacity_text.as_str()),
            ]));

            proptest::prop_assert_eq!(
                config,
                Ok(SyncConfig::default()
                    .with_request_timeout(Duration::from_millis(ms))
                    .with_push_capacity(capacity))
            );
        }
    }
}
