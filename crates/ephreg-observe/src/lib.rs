//! Logging setup shared by the `ephreg` binary and its tests.
//!
//! Records go to stderr so command output on stdout (image references,
//! version strings) stays machine-readable.
mod config;
mod error;
mod format;
mod init;
mod level;
mod timezone;

pub use config::{ENV_FORMAT, ENV_LEVEL, ENV_TZ, LoggerConfig};
pub use error::{LoggerError, LoggerResult};
pub use format::LoggerFormat;
pub use level::LoggerLevel;
pub use timezone::{LoggerTimeZone, Rfc3339Timer, init_local_offset};

/// Installs the global subscriber described by `cfg`.
///
/// Fails with [`LoggerError::AlreadyInitialized`] on a second call. Call
/// [`init_local_offset`] first, before any threads exist, when `cfg.tz` is
/// [`LoggerTimeZone::Local`].
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    match cfg.format {
        LoggerFormat::Text => init::text(cfg),
        LoggerFormat::Json => init::json(cfg),
        LoggerFormat::Journald => init::journald(cfg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        let cfg = LoggerConfig {
            use_color: false,
            ..Default::default()
        };
        // Other tests in this binary never install a subscriber, so only the
        // outcome of the second call is fixed.
        let _ = init_logger(&cfg);
        assert!(matches!(
            init_logger(&cfg),
            Err(LoggerError::AlreadyInitialized)
        ));
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn journald_is_unavailable_off_linux() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Journald,
            ..Default::default()
        };
        assert!(matches!(init_logger(&cfg), Err(LoggerError::JournaldNotSupported)));
    }
}
