use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::constants::{CA_FILE, CERT_FILE, KEY_FILE, TLS_MOUNT_DIR};

/// A file mounted into the registry container.
///
/// Paths are in-container POSIX paths, so they are kept as strings rather than
/// host `PathBuf`s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mount {
    dir: String,
    file: String,
}

impl Mount {
    pub fn new(dir: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file: file.into(),
        }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// `dir/file`, without doubling a trailing slash on `dir`.
    ///
    /// # Examples
    /// ```
    /// use ephreg_model::Mount;
    ///
    /// assert_eq!(Mount::new("/auth/", "htpasswd").path(), "/auth/htpasswd");
    /// ```
    pub fn path(&self) -> String {
        format!("{}/{}", self.dir.trim_end_matches('/'), self.file)
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// CA certificate, server certificate and server key, all from one secret mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsMounts {
    pub ca: Mount,
    pub cert: Mount,
    pub key: Mount,
}

impl TlsMounts {
    /// Standard layout of a cert-manager secret under `dir`.
    pub fn under(dir: &str) -> Self {
        Self {
            ca: Mount::new(dir, CA_FILE),
            cert: Mount::new(dir, CERT_FILE),
            key: Mount::new(dir, KEY_FILE),
        }
    }
}

impl Default for TlsMounts {
    fn default() -> Self {
        Self::under(TLS_MOUNT_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_joins_dir_and_file() {
        assert_eq!(Mount::new("/auth", "htpasswd").path(), "/auth/htpasswd");
        assert_eq!(Mount::new("/auth/", "htpasswd").path(), "/auth/htpasswd");
    }

    #[test]
    fn tls_mounts_share_directory() {
        let tls = TlsMounts::default();
        assert_eq!(tls.ca.path(), "/certs/ca.crt");
        assert_eq!(tls.cert.path(), "/certs/tls.crt");
        assert_eq!(tls.key.path(), "/certs/tls.key");
        assert_eq!(tls.key.dir(), tls.cert.dir());
    }
}
