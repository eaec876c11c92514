use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("key '{0}' was not declared for this store")]
    UndeclaredKey(String),

    #[error("source for key '{0}' closed before a value was published")]
    ClosedSource(String),

    #[error("key '{key}' holds {found}, requested {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("wait for key '{0}' was cancelled")]
    Cancelled(String),

    #[error("no value for key '{key}' after {after:?}")]
    Timeout { key: String, after: Duration },
}
