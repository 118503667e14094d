//! Endpoint and timeout settings read from the environment, then
//! overridden by command-line flags.

use std::time::Duration;

use anyhow::{Context, Result};
use shared::Event;
use tracing::{debug, warn};

pub const ENDPOINT_ENV: &str = "GREENVISION_WEBHOOK_URL";
/// Older deployments only set this one.
pub const LEGACY_ENDPOINT_ENV: &str = "N8N_WEBHOOK_URL";
pub const TIMEOUT_ENV: &str = "GREENVISION_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellConfig {
    pub endpoint: Option<String>,
    pub timeout: Option<Duration>,
}

impl ShellConfig {
    /// Loads `.env` if one exists, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => warn!(error = %e, "ignoring unreadable .env"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let endpoint = non_empty(ENDPOINT_ENV).or_else(|| non_empty(LEGACY_ENDPOINT_ENV));

        let timeout = non_empty(TIMEOUT_ENV)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("{TIMEOUT_ENV} must be a whole number of seconds, got {raw:?}"))
            })
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self { endpoint, timeout })
    }

    #[must_use]
    pub fn with_overrides(mut self, endpoint: Option<String>, timeout_secs: Option<u64>) -> Self {
        if endpoint.is_some() {
            self.endpoint = endpoint;
        }
        if let Some(secs) = timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        self
    }

    /// The core clamps the timeout and validates the URL itself.
    pub fn configure_event(&self) -> Event {
        Event::Configure {
            endpoint: self.endpoint.clone(),
            timeout_ms: self
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn primary_variable_wins_over_legacy() {
        let config = ShellConfig::from_lookup(lookup(&[
            (ENDPOINT_ENV, "https://a.example/hook"),
            (LEGACY_ENDPOINT_ENV, "https://b.example/hook"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://a.example/hook"));
    }

    #[test]
    fn falls_back_to_legacy_variable() {
        let config = ShellConfig::from_lookup(lookup(&[
            (ENDPOINT_ENV, "  "),
            (LEGACY_ENDPOINT_ENV, "https://b.example/hook"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://b.example/hook"));
    }

    #[test]
    fn nothing_set_means_unconfigured() {
        let config = ShellConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ShellConfig::default());
        assert!(matches!(
            config.configure_event(),
            Event::Configure {
                endpoint: None,
                timeout_ms: None
            }
        ));
    }

    #[test]
    fn timeout_must_be_numeric() {
        let err = ShellConfig::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(err.to_string().contains(TIMEOUT_ENV));

        let config = ShellConfig::from_lookup(lookup(&[(TIMEOUT_ENV, "45")])).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn flags_override_environment() {
        let config = ShellConfig::from_lookup(lookup(&[
            (ENDPOINT_ENV, "https://a.example/hook"),
            (TIMEOUT_ENV, "45"),
        ]))
        .unwrap()
        .with_overrides(Some("http://localhost:5678/hook".into()), Some(10));

        match config.configure_event() {
            Event::Configure {
                endpoint,
                timeout_ms,
            } => {
                assert_eq!(endpoint.as_deref(), Some("http://localhost:5678/hook"));
                assert_eq!(timeout_ms, Some(10_000));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
