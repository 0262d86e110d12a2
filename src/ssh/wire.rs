//! OpenSSH wire format inside JSON.
//!
//! Certificates and public keys travel as quoted, standard base64 encoded
//! blobs of their binary wire encoding. `null` and `""` both mean "absent".

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use ssh_key::{Algorithm, Certificate, PublicKey};
use thiserror::Error;

/// Algorithm names of certificate blobs end with this suffix,
/// e.g. `ssh-ed25519-cert-v01@openssh.com`.
const CERT_ALGORITHM_SUFFIX: &str = "-cert-v01@openssh.com";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("error decoding ssh {kind}: {source}")]
    Base64 {
        kind: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("error parsing ssh {kind}: {source}")]
    Parse {
        kind: &'static str,
        #[source]
        source: ssh_key::Error,
    },

    #[error("error encoding ssh {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: ssh_key::Error,
    },

    #[error("error decoding ssh certificate: {algorithm} public key is not a certificate")]
    NotACertificate { algorithm: Algorithm },
}

/// A parsed wire blob: either a bare public key or a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireKey {
    Plain(PublicKey),
    Certificate(Certificate),
}

impl WireKey {
    /// Algorithm of the underlying key.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            WireKey::Plain(key) => key.algorithm(),
            WireKey::Certificate(cert) => cert.algorithm(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ssh_key::Error> {
        match self {
            WireKey::Plain(key) => key.to_bytes(),
            WireKey::Certificate(cert) => cert.to_bytes(),
        }
    }
}

impl From<PublicKey> for WireKey {
    fn from(key: PublicKey) -> Self {
        WireKey::Plain(key)
    }
}

impl From<Certificate> for WireKey {
    fn from(cert: Certificate) -> Self {
        WireKey::Certificate(cert)
    }
}

/// Parses a binary public key blob, which may also hold a certificate.
pub fn parse_public_key(bytes: &[u8]) -> Result<WireKey, ssh_key::Error> {
    match leading_algorithm(bytes) {
        Some(name) if name.ends_with(CERT_ALGORITHM_SUFFIX) => {
            Certificate::from_bytes(bytes).map(WireKey::Certificate)
        }
        _ => PublicKey::from_bytes(bytes).map(WireKey::Plain),
    }
}

/// Reads the length-prefixed algorithm name every key blob starts with.
fn leading_algorithm(bytes: &[u8]) -> Option<&str> {
    let (len, rest) = bytes.split_first_chunk::<4>()?;
    let len = usize::try_from(u32::from_be_bytes(*len)).ok()?;
    std::str::from_utf8(rest.get(..len)?).ok()
}

fn decode_blob(kind: &'static str, text: &str) -> Result<WireKey, WireError> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|source| WireError::Base64 { kind, source })?;
    parse_public_key(&bytes).map_err(|source| WireError::Parse { kind, source })
}

/// Certificate as carried in API responses (`crt`, `addUserCrt`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshCertificate(pub Option<Certificate>);

impl SshCertificate {
    const KIND: &'static str = "certificate";

    /// Base64 text of the certificate, or `None` when absent.
    pub fn encode(&self) -> Result<Option<String>, WireError> {
        let Some(cert) = &self.0 else {
            return Ok(None);
        };
        let bytes = cert.to_bytes().map_err(|source| WireError::Encode {
            kind: Self::KIND,
            source,
        })?;
        Ok(Some(STANDARD.encode(bytes)))
    }

    pub fn decode(text: &str) -> Result<Self, WireError> {
        if text.is_empty() {
            return Ok(SshCertificate(None));
        }
        match decode_blob(Self::KIND, text)? {
            WireKey::Certificate(cert) => Ok(SshCertificate(Some(cert))),
            WireKey::Plain(key) => Err(WireError::NotACertificate {
                algorithm: key.algorithm(),
            }),
        }
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.0.as_ref()
    }
}

impl From<Certificate> for SshCertificate {
    fn from(cert: Certificate) -> Self {
        SshCertificate(Some(cert))
    }
}

impl Serialize for SshCertificate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.encode().map_err(<S::Error as serde::ser::Error>::custom)? {
            Some(text) => serializer.serialize_str(&text),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for SshCertificate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        SshCertificate::decode(&text).map_err(de::Error::custom)
    }
}

/// Public key as carried in API responses (`userKey`, `hostKey`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshPublicKey(pub Option<WireKey>);

impl SshPublicKey {
    const KIND: &'static str = "public key";

    pub fn encode(&self) -> Result<Option<String>, WireError> {
        let Some(key) = &self.0 else {
            return Ok(None);
        };
        let bytes = key.to_bytes().map_err(|source| WireError::Encode {
            kind: Self::KIND,
            source,
        })?;
        Ok(Some(STANDARD.encode(bytes)))
    }

    pub fn decode(text: &str) -> Result<Self, WireError> {
        if text.is_empty() {
            return Ok(SshPublicKey(None));
        }
        decode_blob(Self::KIND, text).map(|key| SshPublicKey(Some(key)))
    }

    pub fn key(&self) -> Option<&WireKey> {
        self.0.as_ref()
    }
}

impl From<PublicKey> for SshPublicKey {
    fn from(key: PublicKey) -> Self {
        SshPublicKey(Some(WireKey::Plain(key)))
    }
}

impl Serialize for SshPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.encode().map_err(<S::Error as serde::ser::Error>::custom)? {
            Some(text) => serializer.serialize_str(&text),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for SshPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        SshPublicKey::decode(&text).map_err(de::Error::custom)
    }
}

/// Serde adapter for raw key bytes sent as standard base64 strings.
pub mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => STANDARD.decode(text).map_err(de::Error::custom),
            None => Ok(Vec::new()),
        }
    }

    /// Keeps "absent" (`None`) apart from "present but empty" (`Some(vec![])`).
    pub mod option {
        use base64::{engine::general_purpose::STANDARD, Engine};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|text| STANDARD.decode(text).map_err(de::Error::custom))
                .transpose()
        }
    }
}
