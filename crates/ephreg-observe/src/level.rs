use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::LoggerError;

/// A validated `EnvFilter` directive string such as `"info"` or
/// `"ephreg_core=debug,kube=warn,info"`.
///
/// The raw text is kept so the value survives a config round trip; the
/// filter itself is rebuilt when the subscriber is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LoggerLevel(String);

impl LoggerLevel {
    /// Validate `s` as an `EnvFilter` directive. Surrounding whitespace is
    /// dropped; an empty directive is rejected.
    ///
    /// # Examples
    /// ```
    /// use ephreg_observe::LoggerLevel;
    ///
    /// let lvl = LoggerLevel::new(" debug ").unwrap();
    /// assert_eq!(lvl.as_str(), "debug");
    /// assert!(LoggerLevel::new("").is_err());
    /// ```
    pub fn new(s: impl Into<String>) -> Result<Self, LoggerError> {
        Self::try_from(s.into())
    }

    /// The directive exactly as validated.
    ///
    /// # Examples
    /// ```
    /// use ephreg_observe::LoggerLevel;
    ///
    /// let lvl = "ephreg_core=trace,info".parse::<LoggerLevel>().unwrap();
    /// assert_eq!(lvl.as_str(), "ephreg_core=trace,info");
    /// ```
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the filter. Falls back to `info` only if the directive stopped
    /// parsing, which construction already rules out.
    pub fn to_env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.0).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        LoggerLevel("info".to_string())
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for LoggerLevel {
    type Error = LoggerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LoggerError::InvalidLevel("empty directive".into()));
        }
        EnvFilter::try_new(trimmed)
            .map(|_| LoggerLevel(trimmed.to_string()))
            .map_err(|e| LoggerError::InvalidLevel(format!("{trimmed:?}: {e}")))
    }
}

impl From<LoggerLevel> for String {
    fn from(l: LoggerLevel) -> Self {
        l.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_per_target_directives() {
        for lvl in ["info", "TRACE", "warn", "ephreg_core=debug,kube=warn,info"] {
            assert!(lvl.parse::<LoggerLevel>().is_ok(), "{lvl}");
        }
    }

    #[test]
    fn rejects_bad_directives() {
        for lvl in ["", "   ", "ephreg_exec=loud", "kube=info,ephreg=nope"] {
            let err = lvl.parse::<LoggerLevel>().unwrap_err();
            assert!(matches!(err, LoggerError::InvalidLevel(_)), "{lvl:?}");
        }
    }

    #[test]
    fn surrounding_whitespace_is_dropped() {
        let lvl = LoggerLevel::new("  debug\n").unwrap();
        assert_eq!(lvl.as_str(), "debug");
    }

    #[test]
    fn default_is_info() {
        assert_eq!(LoggerLevel::default().as_str(), "info");
        let _ = LoggerLevel::default().to_env_filter();
    }

    #[test]
    fn deserializes_from_plain_string() {
        let lvl: LoggerLevel = serde_json::from_str(r#""ephreg_kube=trace""#).unwrap();
        assert_eq!(lvl.as_str(), "ephreg_kube=trace");
        assert!(serde_json::from_str::<LoggerLevel>(r#""x=y""#).is_err());
    }
}
