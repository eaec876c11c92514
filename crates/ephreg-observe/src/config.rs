use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::{
    error::{LoggerError, LoggerResult},
    format::LoggerFormat,
    level::LoggerLevel,
    timezone::LoggerTimeZone,
};

/// Filter directive, e.g. `ephreg_core=debug,info`.
pub const ENV_LEVEL: &str = "EPHREG_LOG";
/// `text`, `json` or `journald`.
pub const ENV_FORMAT: &str = "EPHREG_LOG_FORMAT";
/// `utc` or `local`.
pub const ENV_TZ: &str = "EPHREG_LOG_TZ";

/// Logger settings, usually the `logger:` section of the provisioning file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    pub level: LoggerLevel,
    pub tz: LoggerTimeZone,
    /// Print the emitting module next to each record.
    pub with_targets: bool,
    /// Requested color; still off when stderr is not a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            with_targets: false,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Defaults with `EPHREG_LOG*` variables applied.
    pub fn from_env() -> LoggerResult<Self> {
        Self::default().with_env()
    }

    /// Overlays `EPHREG_LOG*` variables from the process environment.
    pub fn with_env(self) -> LoggerResult<Self> {
        self.overlay(|name| std::env::var(name).ok())
    }

    /// Overlays values returned by `lookup`; blank values are ignored.
    pub fn overlay<F>(mut self, lookup: F) -> LoggerResult<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let value = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());
        let tag = |var: &'static str| move |e: LoggerError| LoggerError::Env {
            var,
            source: Box::new(e),
        };

        if let Some(raw) = value(ENV_LEVEL) {
            self.level = raw.parse().map_err(tag(ENV_LEVEL))?;
        }
        if let Some(raw) = value(ENV_FORMAT) {
            self.format = raw.parse().map_err(tag(ENV_FORMAT))?;
        }
        if let Some(raw) = value(ENV_TZ) {
            self.tz = raw.parse().map_err(tag(ENV_TZ))?;
        }
        Ok(self)
    }

    pub fn should_use_color(&self) -> bool {
        self.use_color && self.format == LoggerFormat::Text && std::io::stderr().is_terminal()
    }
}
