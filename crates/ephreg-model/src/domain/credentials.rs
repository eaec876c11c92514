use std::fmt;

use bcrypt::Version;
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

use crate::{
    domain::constants::{CREDENTIAL_LEN, HTPASSWD_COST},
    error::{ModelError, ModelResult},
};

/// Registry login generated once per run.
///
/// Serialized as the two-key YAML document `username` / `password` kept in the
/// local credential file. The registry itself only sees [`Credentials::htpasswd`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Fresh random credentials from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self {
            username: random_alphanumeric(CREDENTIAL_LEN),
            password: random_alphanumeric(CREDENTIAL_LEN),
        }
    }

    pub fn to_yaml(&self) -> ModelResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// One htpasswd line, `<username>:<bcrypt $2y$ hash>`, newline terminated.
    ///
    /// The salt is random, so two calls never return the same line; use
    /// [`verify_htpasswd`] to check an entry.
    pub fn htpasswd(&self) -> ModelResult<String> {
        let hash = bcrypt::hash_with_result(&self.password, HTPASSWD_COST)?
            .format_for_version(Version::TwoY);
        Ok(format!("{}:{hash}\n", self.username))
    }

    pub fn from_yaml(raw: &str) -> ModelResult<Self> {
        let creds: Self = serde_yaml::from_str(raw)?;
        if creds.username.is_empty() || creds.password.is_empty() {
            return Err(ModelError::InvalidCredentials(
                "username and password must be non-empty".into(),
            ));
        }
        Ok(creds)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// True when `entry` is an htpasswd line for exactly these credentials.
pub fn verify_htpasswd(entry: &str, creds: &Credentials) -> ModelResult<bool> {
    let Some((user, hash)) = entry.trim_end().split_once(':') else {
        return Ok(false);
    };
    if user != creds.username {
        return Ok(false);
    }
    Ok(bcrypt::verify(&creds.password, hash)?)
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_uses_fixed_length_alphanumerics() {
        let creds = Credentials::generate();
        assert_eq!(creds.username.len(), CREDENTIAL_LEN);
        assert_eq!(creds.password.len(), CREDENTIAL_LEN);
        assert!(creds.password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generate_is_not_repeatable() {
        let a = Credentials::generate();
        let b = Credentials::generate();
        assert_ne!(a.password, b.password);
    }

    #[test]
    fn yaml_has_two_keys() {
        let creds = Credentials {
            username: "alice".into(),
            password: "secret".into(),
        };
        let yaml = creds.to_yaml().unwrap();
        assert!(yaml.contains("username: alice"));
        assert!(yaml.contains("password: secret"));
        assert_eq!(Credentials::from_yaml(&yaml).unwrap(), creds);
    }

    #[test]
    fn htpasswd_entry_is_bcrypt_for_the_user() {
        let creds = Credentials {
            username: "alice".into(),
            password: "secret".into(),
        };
        let line = creds.htpasswd().unwrap();
        assert!(line.starts_with("alice:$2y$10$"), "{line}");
        assert!(line.ends_with('\n'));
        assert!(!line.contains("secret"));

        assert!(verify_htpasswd(&line, &creds).unwrap());
        let other = Credentials {
            username: "alice".into(),
            password: "guess".into(),
        };
        assert!(!verify_htpasswd(&line, &other).unwrap());
        assert!(!verify_htpasswd("no-separator", &creds).unwrap());
    }

    #[test]
    fn from_yaml_rejects_empty_fields() {
        let err = Credentials::from_yaml("username: ''\npassword: x\n").unwrap_err();
        assert!(matches!(err, ModelError::InvalidCredentials(_)));
    }

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("alice"));
        assert!(!dbg.contains("hunter2"));
    }
}
