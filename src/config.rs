use chrono::TimeDelta;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::duration::{format_duration, parse_duration};
use crate::jwks::JsonWebKey;
use crate::tls::{TlsOptions, TlsVersion};

/// Minimum validity of an end-entity certificate when not configured.
pub const DEFAULT_MIN_CERT_DURATION_SECONDS: i64 = 5 * 60;

/// Maximum validity of an end-entity certificate when not configured.
pub const DEFAULT_MAX_CERT_DURATION_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error opening {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error parsing {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} cannot be empty")]
    MissingField(&'static str),

    #[error("tls minVersion cannot exceed tls maxVersion")]
    TlsVersionRange { min: TlsVersion, max: TlsVersion },

    #[error("authority cannot be undefined")]
    AuthorityUndefined,

    #[error("authority.provisioners cannot be empty")]
    NoProvisioners,
}

/// CA configuration document, mapped to a JSON object.
///
/// Loaded once at startup; [`Config::validate`] must succeed before the CA
/// serves requests. Validation fills in defaults, so the validated document
/// is what [`Config::save`] persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub root: String,

    #[serde(rename = "crt")]
    pub intermediate_cert: String,

    #[serde(rename = "key")]
    pub intermediate_key: String,

    pub address: String,

    #[serde(rename = "dnsNames")]
    pub dns_names: Vec<String>,

    /// Passed through to the logging setup; member order survives a save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<serde_json::Value>,

    #[serde(rename = "authority", skip_serializing_if = "Option::is_none")]
    pub authority: Option<AuthConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

/// Authority section of the configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provisioners: Vec<Provisioner>,

    /// Distinguished name template for issued certificates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<DnTemplate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cert_duration: Option<CertDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cert_duration: Option<CertDuration>,
}

/// Entity authorized to sign the one-time tokens presented with signing requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provisioner {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub provisioner_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<JsonWebKey>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encrypted_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnTemplate {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organizational_unit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locality: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub province: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub street_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub common_name: String,
}

/// Certificate duration bound, written as `"5m"`, `"24h"`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertDuration(pub TimeDelta);

impl Serialize for CertDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(self.0))
    }
}

impl<'de> Deserialize<'de> for CertDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_duration(&text)
            .map(CertDuration)
            .map_err(|e| de::Error::custom(format!("error parsing {text} as duration: {e}")))
    }
}

impl Config {
    /// Parses the JSON document at `path`. No defaults are applied here.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the document as tab-indented JSON, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let write_error = |source: io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path).map_err(|source| ConfigError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut writer = BufWriter::new(file);
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"\t"));
        self.serialize(&mut serializer)
            .map_err(|e| write_error(e.into()))?;
        writer.write_all(b"\n").map_err(write_error)?;
        writer.flush().map_err(write_error)
    }

    /// Checks required fields and applies defaults.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// address, root, crt, key, dnsNames, then the TLS policy and finally
    /// the authority section.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let required = [
            ("address", self.address.is_empty()),
            ("root", self.root.is_empty()),
            ("crt", self.intermediate_cert.is_empty()),
            ("key", self.intermediate_key.is_empty()),
            ("dnsNames", self.dns_names.is_empty()),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, missing)| *missing) {
            return Err(ConfigError::MissingField(field));
        }

        match self.tls.as_mut() {
            Some(tls) => tls.apply_defaults()?,
            None => self.tls = Some(TlsOptions::builtin()),
        }

        self.authority
            .as_mut()
            .ok_or(ConfigError::AuthorityUndefined)?
            .validate()
    }
}

impl AuthConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.provisioners.is_empty() {
            return Err(ConfigError::NoProvisioners);
        }
        self.template.get_or_insert_with(DnTemplate::default);
        Ok(())
    }

    pub fn min_cert_duration(&self) -> TimeDelta {
        self.min_cert_duration
            .map(|d| d.0)
            .unwrap_or_else(|| TimeDelta::seconds(DEFAULT_MIN_CERT_DURATION_SECONDS))
    }

    pub fn max_cert_duration(&self) -> TimeDelta {
        self.max_cert_duration
            .map(|d| d.0)
            .unwrap_or_else(|| TimeDelta::seconds(DEFAULT_MAX_CERT_DURATION_SECONDS))
    }
}
