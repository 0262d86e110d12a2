use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::authority::{Template, SSH_HOST_CERT, SSH_USER_CERT};
use super::wire::{base64_bytes, SshCertificate, SshPublicKey};
use crate::duration::TimeDuration;

/// Structural problems with a request body, reported as 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown certType {0}")]
    UnknownCertType(String),

    #[error("missing or empty publicKey")]
    MissingPublicKey,

    #[error("missing or empty ott")]
    MissingOtt,

    #[error("unsupported type {0}")]
    UnsupportedType(String),

    #[error("missing or empty principal")]
    MissingPrincipal,
}

/// Body of `POST /ssh/sign`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Raw public key in wire format
    #[serde(default, with = "base64_bytes")]
    pub public_key: Vec<u8>,

    #[serde(default)]
    pub ott: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cert_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<String>,

    #[serde(default, skip_serializing_if = "TimeDuration::is_unset")]
    pub valid_after: TimeDuration,

    #[serde(default, skip_serializing_if = "TimeDuration::is_unset")]
    pub valid_before: TimeDuration,

    #[serde(
        default,
        with = "base64_bytes::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub add_user_public_key: Option<Vec<u8>>,
}

impl SignRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.cert_type.is_empty()
            && self.cert_type != SSH_USER_CERT
            && self.cert_type != SSH_HOST_CERT
        {
            return Err(ValidationError::UnknownCertType(self.cert_type.clone()));
        }
        if self.public_key.is_empty() {
            return Err(ValidationError::MissingPublicKey);
        }
        if self.ott.is_empty() {
            return Err(ValidationError::MissingOtt);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    #[serde(rename = "crt")]
    pub certificate: SshCertificate,

    #[serde(rename = "addUserCrt", default, skip_serializing_if = "Option::is_none")]
    pub add_user_certificate: Option<SshCertificate>,
}

/// Body of `GET /ssh/roots` and `GET /ssh/federation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsResponse {
    #[serde(rename = "userKey", default, skip_serializing_if = "Vec::is_empty")]
    pub user_keys: Vec<SshPublicKey>,

    #[serde(rename = "hostKey", default, skip_serializing_if = "Vec::is_empty")]
    pub host_keys: Vec<SshPublicKey>,
}

/// Body of `POST /ssh/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequest {
    #[serde(rename = "type", default)]
    pub cert_type: String,

    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl ConfigRequest {
    /// An empty type means user configuration and is filled in here.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        match self.cert_type.as_str() {
            "" => {
                self.cert_type = SSH_USER_CERT.to_string();
                Ok(())
            }
            SSH_USER_CERT | SSH_HOST_CERT => Ok(()),
            other => Err(ValidationError::UnsupportedType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_templates: Vec<Template>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_templates: Vec<Template>,
}

/// Body of `POST /ssh/check-host`. Only host certificates are tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPrincipalRequest {
    #[serde(rename = "type", default)]
    pub cert_type: String,

    #[serde(default)]
    pub principal: String,
}

impl CheckPrincipalRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cert_type != SSH_HOST_CERT {
            return Err(ValidationError::UnsupportedType(self.cert_type.clone()));
        }
        if self.principal.is_empty() {
            return Err(ValidationError::MissingPrincipal);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPrincipalResponse {
    pub exists: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHostsResponse {
    pub hosts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_request() -> SignRequest {
        SignRequest {
            public_key: vec![0, 0, 0, 11],
            ott: "eyJhbGciOiJFUzI1NiJ9.token".to_string(),
            ..SignRequest::default()
        }
    }

    #[test]
    fn test_sign_request_cert_types() {
        let mut req = sign_request();
        assert_eq!(req.validate(), Ok(()));

        req.cert_type = "user".to_string();
        assert_eq!(req.validate(), Ok(()));
        req.cert_type = "host".to_string();
        assert_eq!(req.validate(), Ok(()));

        req.cert_type = "X".to_string();
        let err = req.validate().unwrap_err();
        assert_eq!(err, ValidationError::UnknownCertType("X".to_string()));
        assert_eq!(err.to_string(), "unknown certType X");
    }

    #[test]
    fn test_sign_request_missing_fields() {
        let mut req = sign_request();
        req.public_key.clear();
        assert_eq!(req.validate(), Err(ValidationError::MissingPublicKey));

        let mut req = sign_request();
        req.ott.clear();
        assert_eq!(req.validate(), Err(ValidationError::MissingOtt));
    }

    #[test]
    fn test_sign_request_json_shape() {
        let req: SignRequest = serde_json::from_str(
            r#"{"publicKey":"AAAACw==","ott":"t","certType":"user","principals":["alice"],"validBefore":"8h"}"#,
        )
        .unwrap();
        assert_eq!(req.public_key, vec![0, 0, 0, 11]);
        assert_eq!(req.principals, vec!["alice"]);
        assert!(req.valid_after.is_unset());
        assert!(!req.valid_before.is_unset());
        assert_eq!(req.add_user_public_key, None);
    }

    #[test]
    fn test_sign_request_rejects_overflowing_duration() {
        let body = format!(
            r#"{{"publicKey":"AAAACw==","ott":"t","validAfter":"{}ns0.9h"}}"#,
            u128::MAX - 1
        );
        let err = serde_json::from_str::<SignRequest>(&body).unwrap_err();
        assert!(err.to_string().contains("invalid duration"), "{err}");
    }

    #[test]
    fn test_config_request_defaults_to_user() {
        let mut req = ConfigRequest::default();
        req.validate().unwrap();
        assert_eq!(req.cert_type, "user");

        let mut req = ConfigRequest {
            cert_type: "host".to_string(),
            ..ConfigRequest::default()
        };
        req.validate().unwrap();
        assert_eq!(req.cert_type, "host");

        let mut req = ConfigRequest {
            cert_type: "admin".to_string(),
            ..ConfigRequest::default()
        };
        assert_eq!(
            req.validate(),
            Err(ValidationError::UnsupportedType("admin".to_string()))
        );
    }

    #[test]
    fn test_check_principal_request() {
        let req = CheckPrincipalRequest {
            cert_type: "host".to_string(),
            principal: "db01.internal".to_string(),
        };
        assert_eq!(req.validate(), Ok(()));

        let req = CheckPrincipalRequest {
            cert_type: "user".to_string(),
            principal: "alice".to_string(),
        };
        assert_eq!(
            req.validate(),
            Err(ValidationError::UnsupportedType("user".to_string()))
        );

        let req = CheckPrincipalRequest {
            cert_type: "host".to_string(),
            principal: String::new(),
        };
        assert_eq!(req.validate(), Err(ValidationError::MissingPrincipal));
    }

    #[test]
    fn test_empty_roots_response_omits_both_lists() {
        let json = serde_json::to_string(&RootsResponse::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
