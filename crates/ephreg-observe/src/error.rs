use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?} (expected text, json or journald)")]
    InvalidFormat(String),

    #[error("journald output is only available on linux")]
    JournaldNotSupported,

    #[error("journald socket unavailable: {0}")]
    JournaldInitFailed(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("unknown timestamp zone {0:?} (expected utc or local)")]
    InvalidTimeZone(String),

    #[error("invalid filter directive {0}")]
    InvalidLevel(String),

    #[error("{var}: {source}")]
    Env {
        var: &'static str,
        #[source]
        source: Box<LoggerError>,
    },
}

pub type LoggerResult<T> = Result<T, LoggerError>;
