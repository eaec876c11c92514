use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to read config {path}: {reason}")]
    ConfigRead { path: String, reason: String },

    #[error("failed to parse yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("hashing password failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
