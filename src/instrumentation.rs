use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::debug;

use crate::logging::{self, LogFormat};
use crate::metrics::{self, WORKER_INSTRUMENTATION_ACTIVATED_TIMESTAMP_SECONDS, WORKER_INSTRUMENTATION_ACTIVE};

static ACTIVATED_AT: OnceCell<DateTime<Utc>> = OnceCell::new();

#[derive(Debug, Clone, Deserialize)]
struct RawInstrumentationSettings {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_log_format")]
    log_format: String,
}

#[derive(Debug, Clone)]
pub struct InstrumentationSettings {
    pub log_level: String,
    pub log_format: LogFormat,
}

impl InstrumentationSettings {
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawInstrumentationSettings = envy::from_iter(vars)?;
        Ok(Self {
            log_level: raw.log_level.to_ascii_lowercase(),
            log_format: LogFormat::parse(&raw.log_format),
        })
    }
}

impl Default for InstrumentationSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

// Only `init` constructs this.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    activated_at: DateTime<Utc>,
}

impl Instrumentation {
    pub fn activated_at(&self) -> DateTime<Utc> {
        self.activated_at
    }
}

pub fn init(settings: &InstrumentationSettings) -> Instrumentation {
    let activated_at = *ACTIVATED_AT.get_or_init(|| {
        logging::init(&settings.log_level, settings.log_format);
        metrics::register();

        let now = Utc::now();
        WORKER_INSTRUMENTATION_ACTIVATED_TIMESTAMP_SECONDS.set(now.timestamp());
        WORKER_INSTRUMENTATION_ACTIVE.set(1);
        debug!(
            log_level = %settings.log_level,
            log_format = ?settings.log_format,
            "Instrumentation installed"
        );
        now
    });

    Instrumentation { activated_at }
}

pub fn is_active() -> bool {
    ACTIVATED_AT.get().is_some()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
