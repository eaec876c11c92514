use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("api error on {target}: {message}")]
    Api { target: String, message: String },

    #[error("invalid object: {0}")]
    Invalid(String),
}

impl ClusterError {
    pub fn api(target: impl ToString, message: impl Into<String>) -> Self {
        Self::Api {
            target: target.to_string(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;
