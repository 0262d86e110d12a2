use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Cipher suites used when the configuration does not name any.
pub const DEFAULT_CIPHER_SUITES: [&str; 3] = [
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
];

pub const DEFAULT_TLS_VERSION: TlsVersion = TlsVersion(1.2);

pub const DEFAULT_RENEGOTIATION: bool = false;

/// TLS protocol version as written in the configuration (`1.2`, `1.3`).
/// Zero means "not configured".
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TlsVersion(pub f64);

impl TlsVersion {
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// TLS policy of the CA listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsOptions {
    /// Preferred order matters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cipher_suites: Vec<String>,

    #[serde(default, skip_serializing_if = "TlsVersion::is_zero")]
    pub min_version: TlsVersion,

    #[serde(default, skip_serializing_if = "TlsVersion::is_zero")]
    pub max_version: TlsVersion,

    #[serde(default)]
    pub renegotiation: bool,
}

impl TlsOptions {
    /// The built-in policy installed when the configuration has no `tls` block.
    pub fn builtin() -> Self {
        Self {
            cipher_suites: DEFAULT_CIPHER_SUITES.iter().map(|s| s.to_string()).collect(),
            min_version: DEFAULT_TLS_VERSION,
            max_version: DEFAULT_TLS_VERSION,
            renegotiation: DEFAULT_RENEGOTIATION,
        }
    }

    /// Fills unset fields from the built-in policy and checks the version range.
    ///
    /// Steps run in order: cipher suites, max version, min version (which
    /// inherits the already defaulted max version), range check, then the
    /// renegotiation flag is OR-ed with the built-in one.
    pub fn apply_defaults(&mut self) -> Result<(), ConfigError> {
        let builtin = Self::builtin();

        if self.cipher_suites.is_empty() {
            self.cipher_suites = builtin.cipher_suites;
        }
        if self.max_version.is_zero() {
            self.max_version = builtin.max_version;
        }
        if self.min_version.is_zero() {
            self.min_version = self.max_version;
        }
        if self.min_version > self.max_version {
            return Err(ConfigError::TlsVersionRange {
                min: self.min_version,
                max: self.max_version,
            });
        }
        self.renegotiation = self.renegotiation || builtin.renegotiation;

        Ok(())
    }
}
