use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// envy lowercases variable names before matching fields.
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    #[serde(default = "default_worker_port")]
    worker_port: u16,
    #[serde(default = "default_hostname")]
    hostname: String,
    worker_id: Option<String>,
    #[serde(default = "default_shutdown_timeout")]
    shutdown_timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub worker_port: u16,
    pub hostname: String,
    pub worker_id: String,
    pub shutdown_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawSettings = envy::from_iter(vars)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let hostname = raw.hostname.trim().to_string();
        if hostname.is_empty() {
            return Err(ConfigError::Invalid {
                field: "HOSTNAME",
                reason: "must not be empty".to_string(),
            });
        }

        let worker_id = raw
            .worker_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()))
            .to_lowercase();

        Ok(Self {
            worker_port: raw.worker_port,
            hostname,
            worker_id,
            shutdown_timeout: Duration::from_secs(raw.shutdown_timeout_sec.max(1)),
        })
    }
}

fn default_worker_port() -> u16 {
    3030
}

fn default_hostname() -> String {
    "0.0.0.0".to_string()
}

fn default_shutdown_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_vars(Vec::new()).unwrap();
        assert_eq!(settings.worker_port, 3030);
        assert_eq!(settings.hostname, "0.0.0.0");
        assert!(settings.worker_id.starts_with("worker-"));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_host_and_port() {
        let settings =
            Settings::from_vars(vars(&[("HOSTNAME", "127.0.0.1"), ("WORKER_PORT", "3030")])).unwrap();
        assert_eq!(settings.hostname, "127.0.0.1");
        assert_eq!(settings.worker_port, 3030);
    }

    #[test]
    fn rejects_non_numeric_port() {
        let err = Settings::from_vars(vars(&[("WORKER_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let err = Settings::from_vars(vars(&[("WORKER_PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    }

    #[test]
    fn rejects_blank_hostname() {
        let err = Settings::from_vars(vars(&[("HOSTNAME", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "HOSTNAME", .. }));
    }

    #[test]
    fn worker_id_is_normalized() {
        let settings = Settings::from_vars(vars(&[("WORKER_ID", "Worker-A")])).unwrap();
        assert_eq!(settings.worker_id, "worker-a");

        let generated = Settings::from_vars(vars(&[("WORKER_ID", " ")])).unwrap();
        assert!(generated.worker_id.starts_with("worker-"));
    }

    #[test]
    fn shutdown_timeout_has_a_floor() {
        let settings = Settings::from_vars(vars(&[("SHUTDOWN_TIMEOUT_SEC", "0")])).unwrap();
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(1));
    }
}
